//! Axum routes for the active-learning service.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::engine::{EngineError, Transition};
use crate::store::Prediction;
use crate::types::{
    ChangeLocation, DocumentId, LayerId, LedgerEntryId, Margin, Offset, ProjectId, SessionKey, SessionState,
    UserAction, UserId,
};
use crate::SCHEMA_VERSION;

use super::middleware::record_transition_metrics;
use super::state::ServiceState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to replace the predictions of a user in a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutPredictionsRequest {
    /// Annotator.
    pub user: UserId,
    /// Project.
    pub project: ProjectId,
    /// New predictions. Replaces everything previously loaded.
    pub predictions: Vec<Prediction>,
}

/// Response to a predictions upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutPredictionsResponse {
    /// Number of predictions stored.
    pub count: usize,
}

/// Session scope, as a request body or query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Annotator.
    pub user: UserId,
    /// Project.
    pub project: ProjectId,
    /// Layer.
    pub layer: LayerId,
}

impl SessionRequest {
    fn key(&self) -> SessionKey {
        SessionKey::new(self.user.clone(), self.project, self.layer)
    }
}

/// Feedback on one suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    /// Session scope.
    #[serde(flatten)]
    pub session: SessionRequest,
    /// Document of the suggestion.
    pub document: DocumentId,
    /// Span of the suggestion.
    pub offset: Offset,
    /// Label of the suggestion.
    pub label: String,
    /// What the human did.
    pub action: UserAction,
    /// Where the decision was made.
    #[serde(default)]
    pub change_location: ChangeLocation,
}

/// Serializable recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationDto {
    /// Document.
    pub document: DocumentId,
    /// Span.
    pub offset: Offset,
    /// Suggested label.
    pub label: String,
    /// Covered text.
    pub covered_text: String,
    /// Confidence of the suggestion.
    pub confidence: f64,
    /// Classifier that made the suggestion.
    pub classifier_id: String,
    /// Margin value that ranked it.
    pub margin: f64,
    /// Label of the runner-up, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_up: Option<String>,
    /// Stable fingerprint of the recommendation.
    pub fingerprint: String,
}

impl From<&Margin> for RecommendationDto {
    fn from(margin: &Margin) -> Self {
        let primary = &margin.primary;
        Self {
            document: primary.document,
            offset: primary.offset,
            label: primary.label.clone(),
            covered_text: primary.covered_text.clone(),
            confidence: primary.confidence,
            classifier_id: primary.classifier_id.clone(),
            margin: margin.value,
            runner_up: margin.secondary.as_ref().map(|c| c.label.clone()),
            fingerprint: margin.fingerprint(),
        }
    }
}

/// Session view returned by every session route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Session key as `user/project/layer`.
    pub session: String,
    /// Current phase.
    pub phase: String,
    /// Candidates left in the current sweep.
    pub remaining: usize,
    /// Whether replay may be entered.
    pub replay_available: bool,
    /// Recommendation on display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<RecommendationDto>,
    /// Policy identifier.
    pub policy_id: String,
    /// Policy parameters hash.
    pub policy_params_hash: String,
}

/// Response to a decision removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveDecisionResponse {
    /// Whether the entry existed.
    pub removed: bool,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    pub policy_id: String,
    pub policy_params_hash: String,
    pub sessions: usize,
    pub ledger: String,
    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
}

/// Database health information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub pool_size: u32,
    pub pool_idle: usize,
    pub pool_max: u32,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub ledger: bool,
    pub details: Option<String>,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map an engine failure to a response. Collaborator outages are 503.
fn engine_error(e: EngineError) -> ApiError {
    let (status, code) = match &e {
        EngineError::PredictionSourceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "PREDICTION_SOURCE_UNAVAILABLE"),
        EngineError::LedgerWriteFailed(_) => (StatusCode::SERVICE_UNAVAILABLE, "LEDGER_WRITE_FAILED"),
        EngineError::LedgerReadFailed(_) => (StatusCode::SERVICE_UNAVAILABLE, "LEDGER_READ_FAILED"),
        EngineError::AnnotationStoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "ANNOTATION_STORE_UNAVAILABLE"),
        EngineError::InvalidPolicy(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_POLICY"),
    };
    tracing::warn!(code, error = %e, "Engine request failed");
    (status, Json(ErrorResponse::new(code, e.to_string())))
}

fn session_response(state: &ServiceState, session: &SessionState) -> SessionResponse {
    let policy = state.engine.policy();
    SessionResponse {
        session: session.key().to_string(),
        phase: session.phase().to_string(),
        remaining: session.remaining(),
        replay_available: session.replay_available(),
        recommendation: session.current_margin().map(RecommendationDto::from),
        policy_id: policy.policy_id().to_string(),
        policy_params_hash: policy.params_hash(),
    }
}

/// Store a successful transition and render it.
fn commit(
    state: &ServiceState,
    slot: &mut SessionState,
    transition: Transition,
    operation: &'static str,
    start: Instant,
) -> Json<SessionResponse> {
    *slot = transition.state;
    record_transition_metrics(operation, slot.phase(), slot.remaining(), start.elapsed().as_millis() as u64);
    Json(session_response(state, slot))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Replace the predictions of a user in a project.
async fn put_predictions_handler(
    State(state): State<ServiceState>,
    Json(request): Json<PutPredictionsRequest>,
) -> Json<PutPredictionsResponse> {
    let count = request.predictions.len();
    state
        .predictions()
        .set_predictions(request.user, request.project, request.predictions.into_iter().collect());
    Json(PutPredictionsResponse { count })
}

/// Start (or restart) a learning session.
async fn start_session_handler(
    State(state): State<ServiceState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let start = Instant::now();
    let slot = state.session(&request.key());
    let mut session = slot.lock().await;

    let transition = state
        .engine
        .start_session(request.user, request.project, request.layer)
        .await
        .map_err(engine_error)?;
    Ok(commit(&state, &mut session, transition, "start", start))
}

/// Record feedback on a suggestion and advance the session.
async fn feedback_handler(
    State(state): State<ServiceState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let start = Instant::now();
    let key = request.session.key();
    let slot = state.session(&key);
    let mut session = slot.lock().await;

    let candidate = state
        .engine
        .resolve_candidate(&key.user, key.project, request.document, request.offset, &request.label)
        .await
        .map_err(engine_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(
                    ErrorResponse::new("CANDIDATE_NOT_FOUND", "No live prediction matches the selection")
                        .with_details(format!("{} {} {}", request.document, request.offset, request.label)),
                ),
            )
        })?;

    let transition = state
        .engine
        .record_feedback_from(&session, &candidate, request.action, request.change_location)
        .await
        .map_err(engine_error)?;
    Ok(commit(&state, &mut session, transition, "feedback", start))
}

/// Reconsider previously skipped suggestions.
async fn replay_handler(
    State(state): State<ServiceState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let start = Instant::now();
    let slot = state.session(&request.key());
    let mut session = slot.lock().await;

    let transition = state.engine.enter_replay(&session).await.map_err(engine_error)?;
    Ok(commit(&state, &mut session, transition, "replay", start))
}

/// End a learning session.
async fn terminate_handler(
    State(state): State<ServiceState>,
    Json(request): Json<SessionRequest>,
) -> Json<SessionResponse> {
    let key = request.key();
    let Some(slot) = state.find_session(&key) else {
        return Json(session_response(&state, &SessionState::idle(key)));
    };
    let mut session = slot.lock().await;
    *session = state.engine.terminate_session(&session);
    let response = session_response(&state, &session);
    state.release(&key, &slot);
    Json(response)
}

/// Current state of a session.
async fn get_session_handler(
    State(state): State<ServiceState>,
    Query(request): Query<SessionRequest>,
) -> Json<SessionResponse> {
    let key = request.key();
    let Some(slot) = state.find_session(&key) else {
        return Json(session_response(&state, &SessionState::idle(key)));
    };
    let session = slot.lock().await;
    Json(session_response(&state, &session))
}

/// Remove one decision from the ledger.
async fn remove_decision_handler(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<RemoveDecisionResponse>, ApiError> {
    let entry_id = LedgerEntryId::parse(&id).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("INVALID_ENTRY_ID", format!("Invalid ledger entry id: {}", e)).with_details(id.clone())),
        )
    })?;

    let removed = state.engine.remove_decision(entry_id).await.map_err(engine_error)?;
    if removed {
        Ok(Json(RemoveDecisionResponse { removed }))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("DECISION_NOT_FOUND", format!("No decision {}", entry_id))),
        ))
    }
}

/// Health check endpoint (detailed).
async fn health_handler(State(state): State<ServiceState>) -> Json<HealthResponse> {
    let ledger = state.engine.ledger();
    let healthy = ledger.is_healthy().await;
    let policy = state.engine.policy();

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        policy_id: policy.policy_id().to_string(),
        policy_params_hash: policy.params_hash(),
        sessions: state.session_count(),
        ledger: ledger.name().to_string(),
        database: ledger.pool_stats().map(|stats| DatabaseHealth {
            connected: healthy,
            pool_size: stats.size,
            pool_idle: stats.idle,
            pool_max: stats.max,
        }),
    })
}

/// Liveness probe endpoint. Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the ledger is reachable, 503 otherwise.
async fn readiness_handler(
    State(state): State<ServiceState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.engine.ledger().is_healthy().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            ledger: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                ledger: false,
                details: Some("Decision ledger unreachable".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the active-learning service.
pub fn create_router(state: ServiceState) -> Router {
    Router::new()
        // Prediction upload
        .route("/api/predictions", put(put_predictions_handler))
        // Session lifecycle
        .route("/api/sessions", post(start_session_handler).get(get_session_handler))
        .route("/api/sessions/feedback", post(feedback_handler))
        .route("/api/sessions/replay", post(replay_handler))
        .route("/api/sessions/terminate", post(terminate_handler))
        // History
        .route("/api/decisions/:id", delete(remove_decision_handler))
        // Health checks
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}
