//! SelectionPolicy v1: classifier-family rules and replay switch.

use serde::{Deserialize, Serialize};

use super::family::{FamilyRule, FamilyRuleError, FamilyRules};
use crate::canonical::canonical_hash_hex;
use crate::DEFAULT_POLICY_VERSION;

/// Selection policy version 1.
///
/// ## Parameters
///
/// - `family_rules`: Ordered classifier-id patterns deciding which
///   confidence scores may be compared with each other
/// - `replay_enabled`: Whether exhausted sessions may replay skipped candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionPolicyV1 {
    /// Policy version identifier.
    pub version: String,
    /// Classifier-family rules, first match wins.
    pub family_rules: Vec<FamilyRule>,
    /// Whether replay of skipped candidates is offered.
    pub replay_enabled: bool,
}

impl SelectionPolicyV1 {
    /// Create a new policy with custom parameters.
    pub fn new(family_rules: Vec<FamilyRule>, replay_enabled: bool) -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            family_rules,
            replay_enabled,
        }
    }

    /// Parse a policy from JSON. Missing fields are an error.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Compute a hash of the policy parameters.
    ///
    /// Identical policies hash identically across processes.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }

    /// Compile the family rules.
    pub fn compile_families(&self) -> Result<FamilyRules, FamilyRuleError> {
        FamilyRules::compile(&self.family_rules)
    }
}

impl Default for SelectionPolicyV1 {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            family_rules: FamilyRule::defaults(),
            replay_enabled: true,
        }
    }
}
