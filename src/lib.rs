//! # active-query
//!
//! Deterministic query selection for human-in-the-loop annotation.
//!
//! The engine answers one question:
//!
//! > Of everything the machine predicted, which suggestion should a human
//! > look at **next**?
//!
//! ## Core Contract
//!
//! 1. Collect live predictions for a layer into per-span candidate groups
//! 2. Drop placeholders, duplicates and anything the human already settled
//! 3. Split groups by classifier family and compute one margin per sub-group
//! 4. Recommend the candidate with the globally smallest margin
//!
//! ## Architecture
//!
//! ```text
//! PredictionSource → pool → filter → partition → margin → select
//!                              ↑                             ↓
//!                        DecisionLedger  ←──  feedback ── SessionState
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same predictions + same ledger snapshot + same policy → same recommendation
//! - Groups are ordered by (document, offset); candidates keep insertion order
//! - Margin and selection ties go to the first-seen item

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod policy;
pub mod store;
pub mod pool;
pub mod filter;
pub mod partition;
pub mod margin;
pub mod selector;
pub mod engine;
pub mod canonical;
pub mod clock;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    Candidate, CandidateGroup, ClassifierFamily, DocumentId, LayerId, LedgerEntryId, Offset, OffsetError,
    ProjectId, SessionKey, UserId,
};
pub use types::{ChangeLocation, DecisionLedgerEntry, UserAction};
pub use types::{Margin, SessionPhase, SessionState};
pub use types::{NoOpEventSink, RecordingEventSink, SessionEvent, SessionEventSink};
pub use policy::{FamilyRule, FamilyRuleError, FamilyRules, SelectionPolicyV1};
pub use store::{
    AnnotationStore, DecisionLedger, PoolScope, Prediction, PredictionSource, Predictions,
    InMemoryAnnotationStore, InMemoryDecisionLedger, InMemoryError, InMemoryPredictionSource,
};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresDecisionLedger, DECISION_LEDGER_SCHEMA};
pub use engine::{ActiveLearningEngine, EngineError, Transition};
pub use filter::AdjudicationIndex;
pub use selector::{select, select_after_feedback, select_lowest_confidence, Reselection};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex};
pub use clock::{Clock, SteppingClock, SystemClock};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for all serialized engine types.
/// Increment on breaking changes to any schema type.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default policy version identifier.
pub const DEFAULT_POLICY_VERSION: &str = "selection_policy_v1";
