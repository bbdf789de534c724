//! In-memory collaborators for testing and single-process deployments.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::{DecisionLedgerEntry, DocumentId, LayerId, LedgerEntryId, Offset, ProjectId, UserId};
use super::{AnnotationStore, DecisionLedger, PredictionSource, Predictions};

/// Error type for in-memory collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// The collaborator was switched offline.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(&'static str),
}

/// In-memory prediction source keyed by (user, project).
#[derive(Debug, Default)]
pub struct InMemoryPredictionSource {
    predictions: RwLock<BTreeMap<(UserId, ProjectId), Arc<Predictions>>>,
    offline: AtomicBool,
}

impl InMemoryPredictionSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the predictions of a user in a project.
    pub fn set_predictions(&self, user: UserId, project: ProjectId, predictions: Predictions) {
        self.predictions.write().insert((user, project), Arc::new(predictions));
    }

    /// Forget the predictions of a user in a project.
    pub fn clear_predictions(&self, user: &UserId, project: ProjectId) {
        self.predictions.write().remove(&(user.clone(), project));
    }

    /// Make every subsequent read fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl PredictionSource for InMemoryPredictionSource {
    type Error = InMemoryError;

    async fn get_predictions(
        &self,
        user: &UserId,
        project: ProjectId,
    ) -> Result<Option<Arc<Predictions>>, Self::Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(InMemoryError::Unavailable("prediction source"));
        }
        Ok(self.predictions.read().get(&(user.clone(), project)).cloned())
    }
}

/// In-memory decision ledger.
///
/// Entries are kept in append order.
#[derive(Debug, Default)]
pub struct InMemoryDecisionLedger {
    entries: RwLock<Vec<DecisionLedgerEntry>>,
    reject_writes: AtomicBool,
}

impl InMemoryDecisionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail (or succeed again).
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// All entries in append order.
    pub fn all_entries(&self) -> Vec<DecisionLedgerEntry> {
        self.entries.read().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the ledger holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl DecisionLedger for InMemoryDecisionLedger {
    type Error = InMemoryError;

    async fn entries_for(
        &self,
        user: &UserId,
        document: DocumentId,
        layer: LayerId,
    ) -> Result<Vec<DecisionLedgerEntry>, Self::Error> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| &e.user == user && e.document == document && e.layer == layer)
            .cloned()
            .collect())
    }

    async fn append(&self, entry: DecisionLedgerEntry) -> Result<(), Self::Error> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(InMemoryError::Unavailable("decision ledger"));
        }
        self.entries.write().push(entry);
        Ok(())
    }

    async fn delete(&self, id: LedgerEntryId) -> Result<bool, Self::Error> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() != before)
    }
}

/// In-memory annotation store keyed by (document, layer).
#[derive(Debug, Default)]
pub struct InMemoryAnnotationStore {
    spans: RwLock<BTreeMap<(DocumentId, LayerId), Vec<Offset>>>,
}

impl InMemoryAnnotationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a human-made annotation.
    pub fn add_annotation(&self, document: DocumentId, layer: LayerId, offset: Offset) {
        self.spans.write().entry((document, layer)).or_default().push(offset);
    }
}

#[async_trait]
impl AnnotationStore for InMemoryAnnotationStore {
    type Error = InMemoryError;

    async fn existing_annotation_spans(
        &self,
        document: DocumentId,
        layer: LayerId,
        window: Range<u32>,
    ) -> Result<Vec<Offset>, Self::Error> {
        let window = Offset::unchecked(window.start, window.end, 0, 0);
        Ok(self
            .spans
            .read()
            .get(&(document, layer))
            .map(|spans| spans.iter().filter(|s| s.overlaps_chars(&window)).copied().collect())
            .unwrap_or_default())
    }
}
