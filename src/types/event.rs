//! Session notifications.
//!
//! Each notification fires exactly once per corresponding transition, and
//! only after the transition has succeeded. Rendering and audit consumers
//! plug in through [`SessionEventSink`].

use serde::{Deserialize, Serialize};

use super::candidate::Candidate;
use super::ids::SessionKey;

/// Notification emitted on a session transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was started.
    SessionStarted {
        /// Session scope.
        key: SessionKey,
    },
    /// A new recommendation is on display.
    RecommendationShown {
        /// Session scope.
        key: SessionKey,
        /// Primary candidate of the recommendation.
        candidate: Candidate,
    },
    /// The pool of the current sweep ran out.
    SessionCompleted {
        /// Session scope.
        key: SessionKey,
        /// Whether the sweep was a replay of skipped candidates.
        replay: bool,
    },
}

impl SessionEvent {
    /// Short name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::RecommendationShown { .. } => "recommendation_shown",
            Self::SessionCompleted { .. } => "session_completed",
        }
    }

    /// Session the event belongs to.
    pub fn key(&self) -> &SessionKey {
        match self {
            Self::SessionStarted { key }
            | Self::RecommendationShown { key, .. }
            | Self::SessionCompleted { key, .. } => key,
        }
    }

    /// Log this event as a structured record.
    pub fn log(&self) {
        tracing::info!(
            event = self.kind(),
            session = %self.key(),
            "session event"
        );
    }
}

/// Consumer of session notifications.
pub trait SessionEventSink: Send + Sync {
    /// Receive one notification.
    fn emit(&self, event: &SessionEvent);
}

/// Sink that drops every notification.
#[derive(Debug, Default)]
pub struct NoOpEventSink;

impl SessionEventSink for NoOpEventSink {
    fn emit(&self, _event: &SessionEvent) {
        // No-op
    }
}

/// Sink that keeps every notification in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: parking_lot::Mutex<Vec<SessionEvent>>,
}

impl SessionEventSink for RecordingEventSink {
    fn emit(&self, event: &SessionEvent) {
        self.events.lock().push(event.clone());
    }
}

impl RecordingEventSink {
    /// All notifications received so far, in order.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    /// Number of notifications of the given kind.
    pub fn count(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    /// Forget everything received so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
