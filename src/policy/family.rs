//! Classifier-family resolution.
//!
//! Families are resolved once, when a candidate is built, from an ordered
//! list of `regex-lite` patterns over the classifier id. First match wins;
//! an id that matches nothing forms its own `Other` family.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::types::ClassifierFamily;

/// One configured pattern-to-family mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRule {
    /// Regular expression searched for in the classifier id.
    pub pattern: String,
    /// Family assigned on match.
    pub family: ClassifierFamily,
}

impl FamilyRule {
    /// Create a rule.
    pub fn new(pattern: impl Into<String>, family: ClassifierFamily) -> Self {
        Self { pattern: pattern.into(), family }
    }

    /// Default rules: string matchers are lexical, OpenNLP models statistical.
    pub fn defaults() -> Vec<FamilyRule> {
        vec![
            FamilyRule::new("StringMatching", ClassifierFamily::Lexical),
            FamilyRule::new("OpenNlp", ClassifierFamily::Statistical),
        ]
    }
}

/// Error compiling family rules.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FamilyRuleError {
    /// A pattern is not a valid regular expression.
    #[error("Invalid classifier pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Parser message.
        reason: String,
    },
}

/// Compiled family rules.
#[derive(Debug, Clone)]
pub struct FamilyRules {
    rules: Vec<(Regex, ClassifierFamily)>,
}

impl FamilyRules {
    /// Compile an ordered rule list.
    pub fn compile(rules: &[FamilyRule]) -> Result<Self, FamilyRuleError> {
        let compiled = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (re, rule.family.clone()))
                    .map_err(|e| FamilyRuleError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules: compiled })
    }

    /// Resolve the family of a classifier id.
    ///
    /// Returns `None` for an empty id, which cannot be attributed to any
    /// family and is excluded by the pool builder.
    pub fn resolve(&self, classifier_id: &str) -> Option<ClassifierFamily> {
        if classifier_id.is_empty() {
            return None;
        }
        let family = self
            .rules
            .iter()
            .find(|(re, _)| re.is_match(classifier_id))
            .map(|(_, family)| family.clone())
            .unwrap_or_else(|| ClassifierFamily::Other(classifier_id.to_string()));
        Some(family)
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for FamilyRules {
    fn default() -> Self {
        // Default patterns are plain literals and always compile.
        Self::compile(&FamilyRule::defaults()).unwrap_or(Self { rules: Vec::new() })
    }
}
