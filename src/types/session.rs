//! Per-(user, project, layer) learning session state.
//!
//! A `SessionState` is a value: the engine's transitions borrow the prior
//! state and hand back a new one, so a failed transition leaves the
//! caller's state exactly as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::candidate::{pool_size, CandidateGroup};
use super::ids::SessionKey;
use super::margin::Margin;

/// Observable phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session running.
    Idle,
    /// Running, with a recommendation on display.
    Selecting,
    /// Running, nothing left to review.
    Exhausted,
    /// Reviewing previously skipped candidates, with a recommendation on display.
    ReplaySelecting,
    /// Reviewing previously skipped candidates, nothing left.
    ReplayExhausted,
}

impl SessionPhase {
    /// Whether a session is running in this phase.
    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Selecting => write!(f, "selecting"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::ReplaySelecting => write!(f, "replay_selecting"),
            Self::ReplayExhausted => write!(f, "replay_exhausted"),
        }
    }
}

/// State of one learning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    key: SessionKey,
    running: bool,
    current_margin: Option<Margin>,
    replay_mode: bool,
    skip_marker_time: Option<DateTime<Utc>>,
    replay_available: bool,
    /// Whether the source held labelled candidates when the pool was built,
    /// before any ledger filtering.
    #[serde(default)]
    live_candidates: bool,
    /// Filtered working pool of the current sweep.
    pool: Vec<CandidateGroup>,
}

impl SessionState {
    /// State of a session that is not running.
    pub fn idle(key: SessionKey) -> Self {
        Self {
            key,
            running: false,
            current_margin: None,
            replay_mode: false,
            skip_marker_time: None,
            replay_available: false,
            live_candidates: false,
            pool: Vec::new(),
        }
    }

    /// State of a running session over `pool`.
    pub(crate) fn running(
        key: SessionKey,
        pool: Vec<CandidateGroup>,
        current_margin: Option<Margin>,
        replay_mode: bool,
        skip_marker_time: Option<DateTime<Utc>>,
        live_candidates: bool,
    ) -> Self {
        Self {
            key,
            running: true,
            current_margin,
            replay_mode,
            skip_marker_time,
            replay_available: false,
            live_candidates,
            pool,
        }
    }

    /// Copy of this state with a new pool and recommendation, keeping the
    /// mode and marker.
    pub(crate) fn advanced(&self, pool: Vec<CandidateGroup>, current_margin: Option<Margin>) -> Self {
        Self {
            key: self.key.clone(),
            running: self.running,
            current_margin,
            replay_mode: self.replay_mode,
            skip_marker_time: self.skip_marker_time,
            replay_available: false,
            live_candidates: self.live_candidates,
            pool,
        }
    }

    /// Mark whether replay may be entered from this (exhausted) state.
    pub(crate) fn with_replay_available(mut self, available: bool) -> Self {
        self.replay_available = available;
        self
    }

    /// Session scope.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Whether a session is running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Recommendation currently on display.
    pub fn current_margin(&self) -> Option<&Margin> {
        self.current_margin.as_ref()
    }

    /// Whether previously skipped candidates are being reviewed.
    pub fn is_replay_mode(&self) -> bool {
        self.replay_mode
    }

    /// When replay was entered. Skips recorded before it are eligible again.
    pub fn skip_marker_time(&self) -> Option<DateTime<Utc>> {
        self.skip_marker_time
    }

    /// Whether `enter_replay` would find candidates to reconsider.
    pub fn replay_available(&self) -> bool {
        self.replay_available
    }

    /// Whether labelled candidates existed when the pool was last built.
    pub fn has_live_candidates(&self) -> bool {
        self.live_candidates
    }

    /// Working pool of the current sweep.
    pub fn pool(&self) -> &[CandidateGroup] {
        &self.pool
    }

    /// Number of candidates left in the working pool.
    pub fn remaining(&self) -> usize {
        pool_size(&self.pool)
    }

    /// Derived phase.
    pub fn phase(&self) -> SessionPhase {
        match (self.running, self.replay_mode, self.current_margin.is_some()) {
            (false, _, _) => SessionPhase::Idle,
            (true, false, true) => SessionPhase::Selecting,
            (true, false, false) => SessionPhase::Exhausted,
            (true, true, true) => SessionPhase::ReplaySelecting,
            (true, true, false) => SessionPhase::ReplayExhausted,
        }
    }
}
