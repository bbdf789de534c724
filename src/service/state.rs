//! Service state management.
//!
//! Holds the engine, the ledger backend and the per-session locks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::engine::{ActiveLearningEngine, EngineError};
use crate::policy::SelectionPolicyV1;
use crate::store::{
    DecisionLedger, InMemoryAnnotationStore, InMemoryDecisionLedger, InMemoryError, InMemoryPredictionSource,
    PoolStats, PostgresDecisionLedger, PostgresError,
};
use crate::types::{DecisionLedgerEntry, DocumentId, LayerId, LedgerEntryId, SessionKey, SessionState, UserId};

/// Decision ledger chosen at startup.
pub enum LedgerBackend {
    /// Process-local ledger, lost on restart.
    Memory(InMemoryDecisionLedger),
    /// PostgreSQL ledger.
    Postgres(PostgresDecisionLedger),
}

/// Error type for [`LedgerBackend`].
#[derive(Debug, thiserror::Error)]
pub enum LedgerBackendError {
    /// In-memory ledger error.
    #[error(transparent)]
    Memory(#[from] InMemoryError),
    /// PostgreSQL ledger error.
    #[error(transparent)]
    Postgres(#[from] PostgresError),
}

impl LedgerBackend {
    /// Backend name for health output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgres",
        }
    }

    /// Check if the backend is reachable. Always true in memory.
    pub async fn is_healthy(&self) -> bool {
        match self {
            Self::Memory(_) => true,
            Self::Postgres(ledger) => ledger.is_healthy().await,
        }
    }

    /// Pool statistics, for the PostgreSQL backend only.
    pub fn pool_stats(&self) -> Option<PoolStats> {
        match self {
            Self::Memory(_) => None,
            Self::Postgres(ledger) => Some(ledger.pool_stats()),
        }
    }
}

#[async_trait]
impl DecisionLedger for LedgerBackend {
    type Error = LedgerBackendError;

    async fn entries_for(
        &self,
        user: &UserId,
        document: DocumentId,
        layer: LayerId,
    ) -> Result<Vec<DecisionLedgerEntry>, Self::Error> {
        match self {
            Self::Memory(ledger) => Ok(ledger.entries_for(user, document, layer).await?),
            Self::Postgres(ledger) => Ok(ledger.entries_for(user, document, layer).await?),
        }
    }

    async fn append(&self, entry: DecisionLedgerEntry) -> Result<(), Self::Error> {
        match self {
            Self::Memory(ledger) => Ok(ledger.append(entry).await?),
            Self::Postgres(ledger) => Ok(ledger.append(entry).await?),
        }
    }

    async fn delete(&self, id: LedgerEntryId) -> Result<bool, Self::Error> {
        match self {
            Self::Memory(ledger) => Ok(ledger.delete(id).await?),
            Self::Postgres(ledger) => Ok(ledger.delete(id).await?),
        }
    }
}

/// Engine type served over HTTP.
pub type ServiceEngine = ActiveLearningEngine<InMemoryPredictionSource, LedgerBackend, InMemoryAnnotationStore>;

/// Lock guarding one session's state.
pub type SessionSlot = Arc<tokio::sync::Mutex<SessionState>>;

/// Shared service state.
///
/// Requests for the same (user, project, layer) serialize on that
/// session's async lock; different sessions proceed independently.
#[derive(Clone)]
pub struct ServiceState {
    /// The engine.
    pub engine: Arc<ServiceEngine>,
    sessions: Arc<Mutex<HashMap<SessionKey, SessionSlot>>>,
}

impl ServiceState {
    /// Create service state over a ledger backend.
    pub fn new(ledger: LedgerBackend, policy: SelectionPolicyV1) -> Result<Self, EngineError> {
        let engine = ActiveLearningEngine::new(
            Arc::new(InMemoryPredictionSource::new()),
            Arc::new(ledger),
            Arc::new(InMemoryAnnotationStore::new()),
            policy,
        )?;
        Ok(Self {
            engine: Arc::new(engine),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Create service state with an in-memory ledger and the default policy.
    pub fn in_memory() -> Result<Self, EngineError> {
        Self::new(LedgerBackend::Memory(InMemoryDecisionLedger::new()), SelectionPolicyV1::default())
    }

    /// Prediction source fed by `PUT /api/predictions`.
    pub fn predictions(&self) -> &InMemoryPredictionSource {
        self.engine.predictions()
    }

    /// Lock slot of a session, created idle on first use.
    pub fn session(&self, key: &SessionKey) -> SessionSlot {
        let mut sessions = self.sessions.lock();
        Arc::clone(
            sessions
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(SessionState::idle(key.clone())))),
        )
    }

    /// Lock slot of a session, if one is open.
    pub fn find_session(&self, key: &SessionKey) -> Option<SessionSlot> {
        self.sessions.lock().get(key).cloned()
    }

    /// Drop the slot of a terminated session.
    ///
    /// A slot replaced since `slot` was handed out is left alone.
    pub fn release(&self, key: &SessionKey, slot: &SessionSlot) {
        let mut sessions = self.sessions.lock();
        if sessions.get(key).map_or(false, |current| Arc::ptr_eq(current, slot)) {
            sessions.remove(key);
        }
    }

    /// Number of open session slots.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}
