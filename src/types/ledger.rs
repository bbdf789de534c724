//! Decision ledger entries: immutable records of human actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::candidate::{AdjudicationKey, Candidate};
use super::ids::{DocumentId, LayerId, LedgerEntryId, UserId};
use super::offset::Offset;

/// What the human did with a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    /// The recommendation was displayed.
    Shown,
    /// The human turned the recommendation into an annotation.
    Accepted,
    /// The human declared the recommendation wrong.
    Rejected,
    /// The human deferred the decision.
    Skipped,
}

impl UserAction {
    /// Parse an action from its stored name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "shown" => Some(Self::Shown),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Stored name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shown => "shown",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Skipped => "skipped",
        }
    }

    /// Whether the action settles the candidate for the rest of the sweep.
    pub fn settles(&self) -> bool {
        !matches!(self, Self::Shown)
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the UI the decision was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeLocation {
    /// Active-learning sidebar.
    #[default]
    ActiveLearningSidebar,
    /// Main annotation editor.
    MainEditor,
    /// Recommendation sidebar.
    RecommendationSidebar,
    /// Automatically accepted by the system.
    AutoAccept,
}

impl ChangeLocation {
    /// Parse a location from its stored name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active_learning_sidebar" => Some(Self::ActiveLearningSidebar),
            "main_editor" => Some(Self::MainEditor),
            "recommendation_sidebar" => Some(Self::RecommendationSidebar),
            "auto_accept" => Some(Self::AutoAccept),
            _ => None,
        }
    }

    /// Stored name of the location.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActiveLearningSidebar => "active_learning_sidebar",
            Self::MainEditor => "main_editor",
            Self::RecommendationSidebar => "recommendation_sidebar",
            Self::AutoAccept => "auto_accept",
        }
    }
}

/// One immutable human decision about one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLedgerEntry {
    /// Entry id, used for history removal.
    pub id: LedgerEntryId,
    /// Annotator.
    pub user: UserId,
    /// Document.
    pub document: DocumentId,
    /// Layer.
    pub layer: LayerId,
    /// Span the decision is about.
    pub offset: Offset,
    /// Label the decision is about.
    pub label: String,
    /// What the human did.
    pub action: UserAction,
    /// Where the decision was made.
    pub change_location: ChangeLocation,
    /// When the decision was recorded.
    pub timestamp: DateTime<Utc>,
}

impl DecisionLedgerEntry {
    /// Record a decision about `candidate`.
    pub fn for_candidate(
        user: UserId,
        layer: LayerId,
        candidate: &Candidate,
        action: UserAction,
        change_location: ChangeLocation,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::generate(),
            user,
            document: candidate.document,
            layer,
            offset: candidate.offset,
            label: candidate.label.clone(),
            action,
            change_location,
            timestamp,
        }
    }

    /// Key matched against [`Candidate::adjudication_key`].
    pub fn adjudication_key(&self) -> AdjudicationKey {
        let (begin_token, end_token) = self.offset.token_span();
        AdjudicationKey {
            document: self.document,
            begin_token,
            end_token,
            label: self.label.clone(),
        }
    }
}
