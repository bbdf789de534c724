//! Active-learning session engine.
//!
//! Drives the pipeline
//!
//! ```text
//! PredictionSource → pool → filter → partition → margin → select
//!                              ↑
//!                        DecisionLedger
//! ```
//!
//! for one (user, project, layer) session at a time. Transitions borrow the
//! prior [`SessionState`] and return a new one inside a [`Transition`]; on
//! error the caller still holds its untouched prior state, so a retry is
//! safe.

use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::filter::{self, documents_of, load_index};
use crate::policy::{FamilyRuleError, FamilyRules, SelectionPolicyV1};
use crate::pool::{build_pool, to_candidate};
use crate::selector::{select_after_feedback, select_from_pool, select_lowest_confidence};
use crate::store::{AnnotationStore, DecisionLedger, PoolScope, PredictionSource};
use crate::types::{
    Candidate, CandidateGroup, ChangeLocation, DecisionLedgerEntry, DocumentId, LayerId, LedgerEntryId, Margin,
    NoOpEventSink, Offset, ProjectId, SessionEvent, SessionEventSink, SessionKey, SessionPhase, SessionState,
    UserAction, UserId,
};

/// Error type for engine operations.
///
/// Only collaborator failures are errors. "Nothing left to review" is
/// `None`, and malformed items are excluded rather than reported here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The prediction source failed.
    #[error("Prediction source unavailable: {0}")]
    PredictionSourceUnavailable(String),
    /// A ledger append failed. Nothing was recorded.
    #[error("Ledger write failed: {0}")]
    LedgerWriteFailed(String),
    /// Reading or deleting ledger entries failed.
    #[error("Ledger read failed: {0}")]
    LedgerReadFailed(String),
    /// The annotation store failed.
    #[error("Annotation store unavailable: {0}")]
    AnnotationStoreUnavailable(String),
    /// The selection policy could not be compiled.
    #[error("Invalid selection policy: {0}")]
    InvalidPolicy(#[from] FamilyRuleError),
}

impl EngineError {
    /// Wrap a prediction source error.
    pub fn from_source<E: std::error::Error>(e: E) -> Self {
        Self::PredictionSourceUnavailable(e.to_string())
    }

    /// Wrap a ledger read error.
    pub fn from_ledger_read<E: std::error::Error>(e: E) -> Self {
        Self::LedgerReadFailed(e.to_string())
    }

    /// Wrap a ledger write error.
    pub fn from_ledger_write<E: std::error::Error>(e: E) -> Self {
        Self::LedgerWriteFailed(e.to_string())
    }

    /// Wrap an annotation store error.
    pub fn from_annotations<E: std::error::Error>(e: E) -> Self {
        Self::AnnotationStoreUnavailable(e.to_string())
    }
}

/// Result of a successful session transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// New session state.
    pub state: SessionState,
    /// Recommendation to present next, if any.
    pub recommendation: Option<Margin>,
}

impl Transition {
    fn from_state(state: SessionState) -> Self {
        let recommendation = state.current_margin().cloned();
        Self { state, recommendation }
    }
}

/// Active-learning engine over three collaborators.
///
/// Holds no session data of its own; concurrent calls for different
/// sessions are independent. Calls for the same session must be
/// serialized by the caller.
pub struct ActiveLearningEngine<P, L, A>
where
    P: PredictionSource,
    L: DecisionLedger,
    A: AnnotationStore,
{
    predictions: Arc<P>,
    ledger: Arc<L>,
    annotations: Arc<A>,
    policy: SelectionPolicyV1,
    families: FamilyRules,
    events: Arc<dyn SessionEventSink>,
    clock: Arc<dyn Clock>,
}

impl<P, L, A> ActiveLearningEngine<P, L, A>
where
    P: PredictionSource,
    L: DecisionLedger,
    A: AnnotationStore,
{
    /// Create an engine. Fails only if the policy's family rules do not compile.
    pub fn new(
        predictions: Arc<P>,
        ledger: Arc<L>,
        annotations: Arc<A>,
        policy: SelectionPolicyV1,
    ) -> Result<Self, EngineError> {
        let families = policy.compile_families()?;
        Ok(Self {
            predictions,
            ledger,
            annotations,
            policy,
            families,
            events: Arc::new(NoOpEventSink),
            clock: Arc::new(SystemClock),
        })
    }

    /// Send session notifications to `sink`.
    pub fn with_events(mut self, sink: Arc<dyn SessionEventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Take timestamps from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the policy.
    pub fn policy(&self) -> &SelectionPolicyV1 {
        &self.policy
    }

    /// Get a reference to the prediction source.
    pub fn predictions(&self) -> &P {
        &self.predictions
    }

    /// Get a reference to the ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Get a reference to the annotation store.
    pub fn annotations(&self) -> &A {
        &self.annotations
    }

    fn emit(&self, event: SessionEvent) {
        event.log();
        self.events.emit(&event);
    }

    /// Build the project-wide pool and run the full filter pipeline.
    ///
    /// Also reports whether any candidate survived the label and duplicate
    /// filters, before the ledger is consulted.
    async fn rebuild(
        &self,
        key: &SessionKey,
        skip_marker: Option<DateTime<Utc>>,
    ) -> Result<(Vec<CandidateGroup>, bool), EngineError> {
        let raw = build_pool(
            self.predictions.as_ref(),
            &self.families,
            &key.user,
            key.project,
            key.layer,
            PoolScope::Project,
        )
        .await?;
        let minimal = filter::minimal(&raw);
        let index = load_index(self.ledger.as_ref(), &key.user, key.layer, &documents_of(&minimal), skip_marker).await?;
        Ok((filter::drop_adjudicated(&minimal, &index), !minimal.is_empty()))
    }

    /// Attach replay availability to an exhausted state.
    ///
    /// Any candidate that survived the label and duplicate filters at the
    /// last rebuild counts, whatever the ledger says.
    fn settle_exhaustion(&self, state: SessionState) -> SessionState {
        if state.phase() != SessionPhase::Exhausted {
            return state;
        }
        let available = self.policy.replay_enabled
            && !state.is_replay_mode()
            && state.skip_marker_time().is_none()
            && state.has_live_candidates();
        state.with_replay_available(available)
    }

    /// Start a learning session on `layer` and select the first recommendation.
    pub async fn start_session(
        &self,
        user: UserId,
        project: ProjectId,
        layer: LayerId,
    ) -> Result<Transition, EngineError> {
        let key = SessionKey::new(user, project, layer);
        let (pool, live) = self.rebuild(&key, None).await?;
        let margin = select_from_pool(&pool);
        let state = self.settle_exhaustion(SessionState::running(key.clone(), pool, margin, false, None, live));

        tracing::info!(
            session = %key,
            remaining = state.remaining(),
            phase = %state.phase(),
            "Learning session started"
        );

        self.emit(SessionEvent::SessionStarted { key: key.clone() });
        self.announce(&key, None, true, &state);
        Ok(Transition::from_state(state))
    }

    /// Record a decision made in the active-learning sidebar and select the
    /// next recommendation.
    pub async fn record_feedback(
        &self,
        session: &SessionState,
        candidate: &Candidate,
        action: UserAction,
    ) -> Result<Transition, EngineError> {
        self.record_feedback_from(session, candidate, action, ChangeLocation::ActiveLearningSidebar)
            .await
    }

    /// Record a decision made at `location` and select the next recommendation.
    ///
    /// `Shown` is only written to the ledger. Every other action removes the
    /// suggestion from the working pool. The ledger entry is written before
    /// anything else becomes visible; if the write fails no state changes.
    pub async fn record_feedback_from(
        &self,
        session: &SessionState,
        candidate: &Candidate,
        action: UserAction,
        location: ChangeLocation,
    ) -> Result<Transition, EngineError> {
        if !session.is_running() {
            tracing::debug!(session = %session.key(), "Ignoring feedback outside a running session");
            return Ok(Transition::from_state(session.clone()));
        }

        let key = session.key();
        let next = if action.settles() {
            let reselection = select_after_feedback(candidate, session.pool());
            self.settle_exhaustion(session.advanced(reselection.pool, reselection.margin))
        } else {
            session.clone()
        };

        let entry = DecisionLedgerEntry::for_candidate(
            key.user.clone(),
            key.layer,
            candidate,
            action,
            location,
            self.clock.now(),
        );
        let entry_id = entry.id;
        self.ledger
            .append(entry)
            .await
            .map_err(EngineError::from_ledger_write)?;

        tracing::info!(
            session = %key,
            entry_id = %entry_id,
            action = %action,
            document = %candidate.document,
            offset = %candidate.offset,
            label = %candidate.label,
            remaining = next.remaining(),
            phase = %next.phase(),
            "Feedback recorded"
        );

        if action.settles() {
            self.announce(key, session.current_margin(), false, &next);
        }
        Ok(Transition::from_state(next))
    }

    /// Reconsider candidates skipped before now.
    ///
    /// Only valid from [`SessionPhase::Exhausted`] when
    /// [`SessionState::replay_available`] holds; otherwise the session is
    /// returned unchanged. Rejections stay excluded.
    pub async fn enter_replay(&self, session: &SessionState) -> Result<Transition, EngineError> {
        if session.phase() != SessionPhase::Exhausted || !session.replay_available() {
            tracing::debug!(
                session = %session.key(),
                phase = %session.phase(),
                replay_available = session.replay_available(),
                "Replay not available"
            );
            return Ok(Transition::from_state(session.clone()));
        }

        let key = session.key().clone();
        let marker = self.clock.now();
        let (pool, live) = self.rebuild(&key, Some(marker)).await?;
        let margin = select_from_pool(&pool);
        let state = SessionState::running(key.clone(), pool, margin, true, Some(marker), live);

        tracing::info!(
            session = %key,
            skip_marker = %marker,
            remaining = state.remaining(),
            "Replaying skipped recommendations"
        );

        self.announce(&key, None, true, &state);
        Ok(Transition::from_state(state))
    }

    /// End the session. Infallible.
    pub fn terminate_session(&self, session: &SessionState) -> SessionState {
        tracing::info!(session = %session.key(), phase = %session.phase(), "Learning session terminated");
        SessionState::idle(session.key().clone())
    }

    /// Remove a decision from the ledger on explicit human request.
    ///
    /// The candidate becomes eligible again on the next pool rebuild.
    pub async fn remove_decision(&self, id: LedgerEntryId) -> Result<bool, EngineError> {
        let removed = self.ledger.delete(id).await.map_err(EngineError::from_ledger_read)?;
        tracing::info!(entry_id = %id, removed, "Decision removed from history");
        Ok(removed)
    }

    /// Resolve a UI selection back to the candidate that produced it.
    pub async fn resolve_candidate(
        &self,
        user: &UserId,
        project: ProjectId,
        document: DocumentId,
        offset: Offset,
        label: &str,
    ) -> Result<Option<Candidate>, EngineError> {
        let predictions = self
            .predictions
            .get_predictions(user, project)
            .await
            .map_err(EngineError::from_source)?;
        Ok(predictions
            .and_then(|model| model.lookup(document, offset, label).cloned())
            .and_then(|prediction| to_candidate(prediction, &self.families)))
    }

    /// Candidate with the lowest absolute confidence in a character window of
    /// one document, ignoring spans the human already annotated there.
    pub async fn next_lowest_confidence(
        &self,
        user: &UserId,
        project: ProjectId,
        document: DocumentId,
        layer: LayerId,
        window: Range<u32>,
    ) -> Result<Option<Margin>, EngineError> {
        let raw = build_pool(
            self.predictions.as_ref(),
            &self.families,
            user,
            project,
            layer,
            PoolScope::Document(document),
        )
        .await?;
        let window_span = Offset::unchecked(window.start, window.end, 0, 0);
        let in_window: Vec<CandidateGroup> = raw
            .into_iter()
            .filter(|g| g.position.overlaps_chars(&window_span))
            .collect();

        let minimal = filter::minimal(&in_window);
        let index = load_index(self.ledger.as_ref(), user, layer, &documents_of(&minimal), None).await?;
        let pool = filter::drop_adjudicated(&minimal, &index);

        let annotated = self
            .annotations
            .existing_annotation_spans(document, layer, window)
            .await
            .map_err(EngineError::from_annotations)?;
        Ok(select_lowest_confidence(&pool, &annotated))
    }

    /// Emit the notification matching a change of recommendation.
    ///
    /// `fresh` marks a newly built sweep (start or replay), which always
    /// announces its outcome. Otherwise only a change is announced.
    fn announce(&self, key: &SessionKey, previous: Option<&Margin>, fresh: bool, state: &SessionState) {
        match state.current_margin() {
            Some(margin) => {
                let unchanged = previous.map_or(false, |p| p.fingerprint() == margin.fingerprint());
                if fresh || !unchanged {
                    self.emit(SessionEvent::RecommendationShown {
                        key: key.clone(),
                        candidate: margin.primary.clone(),
                    });
                }
            }
            None if fresh || previous.is_some() => {
                self.emit(SessionEvent::SessionCompleted {
                    key: key.clone(),
                    replay: state.is_replay_mode(),
                });
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SteppingClock;
    use crate::store::{InMemoryAnnotationStore, InMemoryDecisionLedger, InMemoryPredictionSource, Prediction, Predictions};
    use crate::types::RecordingEventSink;

    type TestEngine = ActiveLearningEngine<InMemoryPredictionSource, InMemoryDecisionLedger, InMemoryAnnotationStore>;

    struct Fixture {
        source: Arc<InMemoryPredictionSource>,
        ledger: Arc<InMemoryDecisionLedger>,
        annotations: Arc<InMemoryAnnotationStore>,
        events: Arc<RecordingEventSink>,
        engine: TestEngine,
    }

    fn span(begin_char: u32, end_char: u32, token: u32) -> Offset {
        Offset::unchecked(begin_char, end_char, token, token + 1)
    }

    fn prediction(offset: Offset, label: &str, confidence: f64, clf: &str) -> Prediction {
        Prediction {
            document: DocumentId(1),
            layer: LayerId(1),
            offset,
            label: Some(label.to_string()),
            confidence,
            classifier_id: clf.to_string(),
            recommender_id: 7,
            covered_text: "text".to_string(),
        }
    }

    /// Three spans, five candidates. Review order by margin:
    /// ORG (0.2), PER/LOC at the first span (0.3), then the mixed span.
    fn sample_predictions() -> Predictions {
        vec![
            prediction(span(0, 4, 0), "PER", 0.9, "OpenNlpNer"),
            prediction(span(0, 4, 0), "LOC", 0.6, "OpenNlpNer"),
            prediction(span(10, 15, 2), "ORG", 0.2, "OpenNlpNer"),
            prediction(span(20, 25, 4), "PER", 0.5, "StringMatchingRecommender"),
            prediction(span(20, 25, 4), "LOC", 0.45, "OpenNlpNer"),
        ]
        .into_iter()
        .collect()
    }

    fn fixture_with(policy: SelectionPolicyV1) -> Fixture {
        let source = Arc::new(InMemoryPredictionSource::new());
        source.set_predictions(alice(), ProjectId(1), sample_predictions());
        let ledger = Arc::new(InMemoryDecisionLedger::new());
        let annotations = Arc::new(InMemoryAnnotationStore::new());
        let events = Arc::new(RecordingEventSink::default());
        let engine = ActiveLearningEngine::new(source.clone(), ledger.clone(), annotations.clone(), policy)
            .unwrap()
            .with_clock(Arc::new(SteppingClock::from_epoch()))
            .with_events(events.clone());
        Fixture { source, ledger, annotations, events, engine }
    }

    fn fixture() -> Fixture {
        fixture_with(SelectionPolicyV1::default())
    }

    fn alice() -> UserId {
        UserId::new("alice")
    }

    async fn start(f: &Fixture) -> Transition {
        f.engine.start_session(alice(), ProjectId(1), LayerId(1)).await.unwrap()
    }

    /// Apply `action` to every recommendation until the sweep is exhausted.
    async fn drain(f: &Fixture, mut t: Transition, action: UserAction) -> (Transition, Vec<String>) {
        let mut labels = Vec::new();
        while let Some(margin) = t.recommendation.clone() {
            labels.push(margin.primary.label.clone());
            t = f.engine.record_feedback(&t.state, &margin.primary, action).await.unwrap();
        }
        (t, labels)
    }

    // ────────────────────────────────────────────────────────────────
    // Start
    // ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_start_selects_smallest_margin() {
        let f = fixture();
        let t = start(&f).await;

        assert_eq!(t.state.phase(), SessionPhase::Selecting);
        assert_eq!(t.state.remaining(), 5);
        let margin = t.recommendation.unwrap();
        assert_eq!(margin.primary.label, "ORG");
        assert!((margin.value - 0.2).abs() < 1e-12);

        let kinds: Vec<_> = f.events.events().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["session_started", "recommendation_shown"]);
    }

    #[tokio::test]
    async fn test_start_without_predictions_is_exhausted() {
        let f = fixture();
        f.source.clear_predictions(&alice(), ProjectId(1));
        let t = start(&f).await;

        assert_eq!(t.state.phase(), SessionPhase::Exhausted);
        assert!(t.recommendation.is_none());
        assert!(!t.state.replay_available());
        assert_eq!(f.events.count("session_completed"), 1);
    }

    #[tokio::test]
    async fn test_start_with_offline_source_fails() {
        let f = fixture();
        f.source.set_offline(true);
        let err = f.engine.start_session(alice(), ProjectId(1), LayerId(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::PredictionSourceUnavailable(_)));
        assert!(f.events.events().is_empty());
    }

    // ────────────────────────────────────────────────────────────────
    // Feedback
    // ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_rejecting_everything_exhausts_monotonically() {
        let f = fixture();
        let mut t = start(&f).await;
        let mut remaining = t.state.remaining();
        let mut labels = Vec::new();

        while let Some(margin) = t.recommendation.clone() {
            labels.push(margin.primary.label.clone());
            t = f
                .engine
                .record_feedback(&t.state, &margin.primary, UserAction::Rejected)
                .await
                .unwrap();
            assert!(t.state.remaining() < remaining);
            remaining = t.state.remaining();
        }

        assert_eq!(labels, vec!["ORG", "PER", "LOC", "PER", "LOC"]);
        assert_eq!(t.state.phase(), SessionPhase::Exhausted);
        assert_eq!(f.ledger.len(), 5);
        assert_eq!(f.events.count("session_completed"), 1);
        assert_eq!(f.events.count("recommendation_shown"), 5);
    }

    #[tokio::test]
    async fn test_rejected_stay_excluded_on_restart() {
        let f = fixture();
        let t = start(&f).await;
        let org = t.recommendation.clone().unwrap().primary;
        f.engine.record_feedback(&t.state, &org, UserAction::Rejected).await.unwrap();

        let restarted = start(&f).await;
        assert_eq!(restarted.state.remaining(), 4);
        assert!(restarted
            .state
            .pool()
            .iter()
            .flat_map(|g| g.iter())
            .all(|c| c.label != "ORG"));
    }

    #[tokio::test]
    async fn test_shown_only_writes_ledger() {
        let f = fixture();
        let t = start(&f).await;
        let org = t.recommendation.clone().unwrap().primary;
        let next = f.engine.record_feedback(&t.state, &org, UserAction::Shown).await.unwrap();

        assert_eq!(next.state, t.state);
        assert_eq!(f.ledger.len(), 1);
        assert_eq!(f.events.count("recommendation_shown"), 1);
    }

    #[tokio::test]
    async fn test_failed_ledger_write_leaves_state_untouched() {
        let f = fixture();
        let t = start(&f).await;
        f.events.clear();
        f.ledger.set_reject_writes(true);

        let org = t.recommendation.clone().unwrap().primary;
        let err = f
            .engine
            .record_feedback(&t.state, &org, UserAction::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::LedgerWriteFailed(_)));
        assert!(f.ledger.is_empty());
        assert!(f.events.events().is_empty());

        // Retry with the prior state once the ledger recovers.
        f.ledger.set_reject_writes(false);
        let next = f.engine.record_feedback(&t.state, &org, UserAction::Rejected).await.unwrap();
        assert_eq!(next.state.remaining(), 4);
        assert_eq!(f.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_feedback_records_change_location() {
        let f = fixture();
        let t = start(&f).await;
        let org = t.recommendation.clone().unwrap().primary;
        f.engine
            .record_feedback_from(&t.state, &org, UserAction::Accepted, ChangeLocation::MainEditor)
            .await
            .unwrap();

        let entries = f.ledger.all_entries();
        assert_eq!(entries[0].change_location, ChangeLocation::MainEditor);
        assert_eq!(entries[0].action, UserAction::Accepted);
        assert_eq!(entries[0].timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_last_feedback_does_not_read_source() {
        let f = fixture();
        let mut t = start(&f).await;
        while t.state.remaining() > 1 {
            let primary = t.recommendation.clone().unwrap().primary;
            t = f.engine.record_feedback(&t.state, &primary, UserAction::Rejected).await.unwrap();
        }

        f.source.set_offline(true);
        let last = t.recommendation.clone().unwrap().primary;
        let done = f.engine.record_feedback(&t.state, &last, UserAction::Rejected).await.unwrap();

        assert_eq!(done.state.phase(), SessionPhase::Exhausted);
        assert!(done.state.replay_available());
        assert_eq!(f.ledger.len(), 5);
        assert_eq!(f.events.count("session_completed"), 1);
    }

    #[tokio::test]
    async fn test_feedback_on_idle_session_is_ignored() {
        let f = fixture();
        let t = start(&f).await;
        let idle = f.engine.terminate_session(&t.state);
        let org = t.recommendation.unwrap().primary;

        let next = f.engine.record_feedback(&idle, &org, UserAction::Rejected).await.unwrap();
        assert_eq!(next.state.phase(), SessionPhase::Idle);
        assert!(f.ledger.is_empty());
    }

    // ────────────────────────────────────────────────────────────────
    // Replay
    // ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_replay_reopens_skipped_but_not_rejected() {
        let f = fixture();
        let t = start(&f).await;
        let org = t.recommendation.clone().unwrap().primary;
        let t = f.engine.record_feedback(&t.state, &org, UserAction::Rejected).await.unwrap();
        let (exhausted, skipped) = drain(&f, t, UserAction::Skipped).await;

        assert_eq!(skipped.len(), 4);
        assert_eq!(exhausted.state.phase(), SessionPhase::Exhausted);
        assert!(exhausted.state.replay_available());

        let replay = f.engine.enter_replay(&exhausted.state).await.unwrap();
        assert_eq!(replay.state.phase(), SessionPhase::ReplaySelecting);
        assert!(replay.state.skip_marker_time().is_some());
        assert_eq!(replay.state.remaining(), 4);
        assert_eq!(replay.recommendation.as_ref().unwrap().primary.label, "PER");

        let (done, reviewed) = drain(&f, replay, UserAction::Skipped).await;
        assert_eq!(reviewed.len(), 4);
        assert_eq!(done.state.phase(), SessionPhase::ReplayExhausted);
        assert!(!done.state.replay_available());
        assert_eq!(f.events.count("session_completed"), 2);
    }

    #[tokio::test]
    async fn test_enter_replay_outside_exhausted_is_noop() {
        let f = fixture();
        let t = start(&f).await;
        let same = f.engine.enter_replay(&t.state).await.unwrap();
        assert_eq!(same.state, t.state);
        assert_eq!(same.recommendation, t.recommendation);
    }

    #[tokio::test]
    async fn test_enter_replay_without_candidates_is_noop() {
        let f = fixture();
        f.source.clear_predictions(&alice(), ProjectId(1));
        let t = start(&f).await;
        assert!(!t.state.replay_available());

        let same = f.engine.enter_replay(&t.state).await.unwrap();
        assert_eq!(same.state, t.state);
        assert!(same.state.skip_marker_time().is_none());
        assert_eq!(f.events.count("session_completed"), 1);
    }

    #[tokio::test]
    async fn test_replay_disabled_by_policy() {
        let f = fixture_with(SelectionPolicyV1::new(crate::policy::FamilyRule::defaults(), false));
        let (exhausted, _) = drain(&f, start(&f).await, UserAction::Skipped).await;
        assert!(!exhausted.state.replay_available());

        let same = f.engine.enter_replay(&exhausted.state).await.unwrap();
        assert_eq!(same.state.phase(), SessionPhase::Exhausted);
    }

    #[tokio::test]
    async fn test_terminate_is_idle() {
        let f = fixture();
        let t = start(&f).await;
        let idle = f.engine.terminate_session(&t.state);
        assert_eq!(idle.phase(), SessionPhase::Idle);
        assert_eq!(idle.key(), t.state.key());
    }

    // ────────────────────────────────────────────────────────────────
    // Auxiliary operations
    // ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_remove_decision_reopens_candidate() {
        let f = fixture();
        let t = start(&f).await;
        let org = t.recommendation.clone().unwrap().primary;
        f.engine.record_feedback(&t.state, &org, UserAction::Rejected).await.unwrap();
        let id = f.ledger.all_entries()[0].id;

        assert!(f.engine.remove_decision(id).await.unwrap());
        assert!(!f.engine.remove_decision(id).await.unwrap());
        assert_eq!(start(&f).await.state.remaining(), 5);
    }

    #[tokio::test]
    async fn test_resolve_candidate() {
        let f = fixture();
        let found = f
            .engine
            .resolve_candidate(&alice(), ProjectId(1), DocumentId(1), span(20, 25, 4), "PER")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.family, crate::types::ClassifierFamily::Lexical);
        assert_eq!(found.recommender_id, 7);

        let missing = f
            .engine
            .resolve_candidate(&alice(), ProjectId(1), DocumentId(1), span(20, 25, 4), "ORG")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_lowest_confidence_skips_annotated_and_window() {
        let f = fixture();
        f.annotations.add_annotation(DocumentId(1), LayerId(1), span(10, 15, 2));

        let picked = f
            .engine
            .next_lowest_confidence(&alice(), ProjectId(1), DocumentId(1), LayerId(1), 0..16)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.primary.label, "LOC");
        assert!((picked.value - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let policy = SelectionPolicyV1::new(
            vec![crate::policy::FamilyRule::new("(", crate::types::ClassifierFamily::Lexical)],
            true,
        );
        let result = ActiveLearningEngine::new(
            Arc::new(InMemoryPredictionSource::new()),
            Arc::new(InMemoryDecisionLedger::new()),
            Arc::new(InMemoryAnnotationStore::new()),
            policy,
        );
        assert!(matches!(result, Err(EngineError::InvalidPolicy(_))));
    }
}
