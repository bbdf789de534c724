//! Uncertainty margin of a candidate group.

use serde::{Deserialize, Serialize};

use super::candidate::Candidate;
use super::ids::DocumentId;
use super::offset::Offset;
use crate::canonical::canonical_hash_hex;

/// Quantization factor applied to margin values before hashing.
const MARGIN_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// How uncertain the engine is about one group.
///
/// Smaller `value` means more uncertain, which means queried sooner.
/// `secondary` is present only when the margin came from two competing
/// candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    /// Scalar margin.
    pub value: f64,
    /// Candidate to present to the human.
    pub primary: Candidate,
    /// Closest competitor of `primary`, if any.
    pub secondary: Option<Candidate>,
}

/// Hashable identity of a candidate inside a margin fingerprint.
#[derive(Serialize)]
struct CandidateIdentity<'a> {
    document: DocumentId,
    offset: Offset,
    label: &'a str,
    classifier_id: &'a str,
    recommender_id: u64,
}

impl<'a> From<&'a Candidate> for CandidateIdentity<'a> {
    fn from(c: &'a Candidate) -> Self {
        Self {
            document: c.document,
            offset: c.offset,
            label: &c.label,
            classifier_id: &c.classifier_id,
            recommender_id: c.recommender_id,
        }
    }
}

#[derive(Serialize)]
struct MarginIdentity<'a> {
    value: i64,
    primary: CandidateIdentity<'a>,
    secondary: Option<CandidateIdentity<'a>>,
}

impl Margin {
    /// Margin of a lone candidate: its absolute confidence.
    pub fn single(candidate: Candidate) -> Self {
        Self {
            value: candidate.confidence.abs(),
            primary: candidate,
            secondary: None,
        }
    }

    /// Margin between two adjacent candidates in confidence order.
    pub fn pair(primary: Candidate, secondary: Candidate) -> Self {
        Self {
            value: (primary.confidence - secondary.confidence).abs(),
            primary,
            secondary: Some(secondary),
        }
    }

    /// Stable fingerprint of this recommendation.
    ///
    /// The value is quantized to 1e-6 so that float formatting does not
    /// leak into the hash.
    pub fn fingerprint(&self) -> String {
        let identity = MarginIdentity {
            value: (self.value * MARGIN_QUANTIZATION_FACTOR).round() as i64,
            primary: CandidateIdentity::from(&self.primary),
            secondary: self.secondary.as_ref().map(CandidateIdentity::from),
        };
        canonical_hash_hex(&identity)
    }
}
