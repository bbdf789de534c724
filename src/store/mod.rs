//! Collaborator interfaces and their backends.
//!
//! The engine never owns persistent data. Predictions, human decisions and
//! existing annotations live behind these traits.

pub mod predictions;
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use std::ops::Range;
use std::sync::Arc;

use crate::types::{DecisionLedgerEntry, DocumentId, LayerId, LedgerEntryId, Offset, ProjectId, UserId};

pub use predictions::{Prediction, PredictionGroup, Predictions, PoolScope};

/// Source of machine-generated predictions.
#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Error type for source operations.
    type Error: std::error::Error + Send + Sync;

    /// Current predictions for a user in a project.
    ///
    /// `Ok(None)` means no predictions have been produced yet, which is a
    /// valid empty state.
    async fn get_predictions(
        &self,
        user: &UserId,
        project: ProjectId,
    ) -> Result<Option<Arc<Predictions>>, Self::Error>;
}

/// Append-only ledger of human decisions.
///
/// Entries must be readable by `entries_for` as soon as `append` returns.
#[async_trait]
pub trait DecisionLedger: Send + Sync {
    /// Error type for ledger operations.
    type Error: std::error::Error + Send + Sync;

    /// Entries of a user for one document and layer, in append order.
    async fn entries_for(
        &self,
        user: &UserId,
        document: DocumentId,
        layer: LayerId,
    ) -> Result<Vec<DecisionLedgerEntry>, Self::Error>;

    /// Append one entry.
    async fn append(&self, entry: DecisionLedgerEntry) -> Result<(), Self::Error>;

    /// Remove one entry on explicit human request. Returns whether it existed.
    async fn delete(&self, id: LedgerEntryId) -> Result<bool, Self::Error>;
}

/// Store of the document text and its human-made annotations.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync;

    /// Offsets of existing annotations on `layer` whose characters overlap `window`.
    async fn existing_annotation_spans(
        &self,
        document: DocumentId,
        layer: LayerId,
        window: Range<u32>,
    ) -> Result<Vec<Offset>, Self::Error>;
}

pub use memory::{InMemoryAnnotationStore, InMemoryDecisionLedger, InMemoryError, InMemoryPredictionSource};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresDecisionLedger, PostgresError, PoolStats, DECISION_LEDGER_SCHEMA};
