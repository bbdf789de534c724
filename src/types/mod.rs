//! Core types for the query-selection engine.

pub mod ids;
pub mod offset;
pub mod candidate;
pub mod margin;
pub mod ledger;
pub mod session;
pub mod event;

pub use ids::{UserId, ProjectId, DocumentId, LayerId, LedgerEntryId, SessionKey};
pub use offset::{Offset, OffsetError};
pub use candidate::{
    Candidate, CandidateGroup, ClassifierFamily, DedupKey, AdjudicationKey, pool_size,
};
pub use margin::Margin;
pub use ledger::{DecisionLedgerEntry, UserAction, ChangeLocation};
pub use session::{SessionState, SessionPhase};
pub use event::{SessionEvent, SessionEventSink, NoOpEventSink, RecordingEventSink};
