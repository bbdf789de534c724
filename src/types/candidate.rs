//! Candidates: machine-predicted (span, label) suggestions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::DocumentId;
use super::offset::Offset;

/// Coarse category of prediction source whose confidence scores are comparable.
///
/// Resolved once when a candidate is built (see [`crate::policy::FamilyRules`]).
/// Two candidates are family-compatible iff their families are equal; every
/// distinct `Other` id is its own family.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ClassifierFamily {
    /// String-matching and dictionary recommenders.
    Lexical,
    /// Trained statistical models.
    Statistical,
    /// Any other classifier, keyed by its classifier id.
    Other(String),
}

impl fmt::Display for ClassifierFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Statistical => write!(f, "statistical"),
            Self::Other(id) => write!(f, "other:{}", id),
        }
    }
}

/// One (span, label, confidence, classifier) prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Document the span belongs to.
    pub document: DocumentId,
    /// Span position.
    pub offset: Offset,
    /// Predicted label. Empty means the recommender had no answer.
    pub label: String,
    /// Raw confidence score. Usually in `[0, 1]` but may be unbounded.
    pub confidence: f64,
    /// Identifier of the classifier that produced the prediction.
    pub classifier_id: String,
    /// Identifier of the recommender configuration.
    pub recommender_id: u64,
    /// Document text covered by the span.
    pub covered_text: String,
    /// Classifier family, resolved from `classifier_id`.
    pub family: ClassifierFamily,
}

impl Candidate {
    /// Create a candidate.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document: DocumentId,
        offset: Offset,
        label: impl Into<String>,
        confidence: f64,
        classifier_id: impl Into<String>,
        recommender_id: u64,
        covered_text: impl Into<String>,
        family: ClassifierFamily,
    ) -> Self {
        Self {
            document,
            offset,
            label: label.into(),
            confidence,
            classifier_id: classifier_id.into(),
            recommender_id,
            covered_text: covered_text.into(),
            family,
        }
    }

    /// Whether the candidate carries a usable label.
    pub fn has_label(&self) -> bool {
        !self.label.is_empty()
    }

    /// Duplicate-detection key: `(classifier_id, label, document)`.
    ///
    /// Offset is deliberately not part of this key.
    pub fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            classifier_id: &self.classifier_id,
            label: &self.label,
            document: self.document,
        }
    }

    /// Ledger matching key: `(document, begin_token, end_token, label)`.
    pub fn adjudication_key(&self) -> AdjudicationKey {
        let (begin_token, end_token) = self.offset.token_span();
        AdjudicationKey {
            document: self.document,
            begin_token,
            end_token,
            label: self.label.clone(),
        }
    }

    /// Whether `other` denotes the same suggestion for feedback purposes:
    /// same document, same offset and same label, regardless of classifier.
    pub fn same_suggestion(&self, other: &Candidate) -> bool {
        self.document == other.document && self.offset == other.offset && self.label == other.label
    }
}

/// Borrowed duplicate-detection key of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey<'a> {
    /// Classifier id.
    pub classifier_id: &'a str,
    /// Label.
    pub label: &'a str,
    /// Document.
    pub document: DocumentId,
}

/// Key under which human decisions suppress candidates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AdjudicationKey {
    /// Document.
    pub document: DocumentId,
    /// First token.
    pub begin_token: u32,
    /// Last token.
    pub end_token: u32,
    /// Label.
    pub label: String,
}

/// All candidates located at one span position of one document.
///
/// Candidate order is the insertion order of the pool builder and is
/// significant for duplicate filtering and tie-breaking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateGroup {
    /// Document the position belongs to.
    pub document: DocumentId,
    /// Shared span position.
    pub position: Offset,
    /// Members in insertion order.
    pub candidates: Vec<Candidate>,
}

impl CandidateGroup {
    /// Create a group.
    pub fn new(document: DocumentId, position: Offset, candidates: Vec<Candidate>) -> Self {
        Self { document, position, candidates }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the group has no members left.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Iterate over the members in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    /// Build a new group at the same position holding only the members
    /// that satisfy `keep`, in original order.
    pub fn filtered<'a, F>(&'a self, mut keep: F) -> CandidateGroup
    where
        F: FnMut(&'a Candidate) -> bool,
    {
        CandidateGroup {
            document: self.document,
            position: self.position,
            candidates: self.candidates.iter().filter(|c| keep(*c)).cloned().collect(),
        }
    }
}

/// Total number of candidates across groups.
pub fn pool_size(groups: &[CandidateGroup]) -> usize {
    groups.iter().map(CandidateGroup::len).sum()
}
