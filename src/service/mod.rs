//! Active-learning REST service
//!
//! Exposes the engine as a REST API for annotation front ends.
//!
//! ## Endpoints
//!
//! - `PUT /api/predictions` - Replace the predictions of a user in a project
//! - `POST /api/sessions` - Start a learning session
//! - `GET /api/sessions` - Current state of a session
//! - `POST /api/sessions/feedback` - Record a decision and advance
//! - `POST /api/sessions/replay` - Reconsider skipped suggestions
//! - `POST /api/sessions/terminate` - End a session
//! - `DELETE /api/decisions/:id` - Remove a decision from history
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, normalize_path, record_transition_metrics};
pub use routes::{create_router, ErrorResponse, SessionResponse};
pub use state::{LedgerBackend, LedgerBackendError, ServiceEngine, ServiceState};
