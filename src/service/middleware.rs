//! Service middleware for metrics and request tracking.
//!
//! ## Metrics Exposed
//!
//! - `request` records by path pattern, method, status and latency
//! - `transition` records by operation, resulting phase and pool size
//!
//! Emitted as structured `tracing` records under the
//! `active_query::metrics` target, to be aggregated from logs.

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use regex_lite::Regex;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

use crate::types::SessionPhase;

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "active_query::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

fn uuid_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").ok())
        .as_ref()
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces ledger entry ids with an `:id` placeholder.
pub fn normalize_path(path: &str) -> String {
    match uuid_pattern() {
        Some(re) => re.replace_all(path, ":id").into_owned(),
        None => path.to_string(),
    }
}

/// Record one session transition.
pub fn record_transition_metrics(operation: &'static str, phase: SessionPhase, remaining: usize, latency_ms: u64) {
    info!(
        target: "active_query::metrics",
        metric_type = "transition",
        operation = operation,
        phase = %phase,
        remaining = remaining,
        latency_ms = latency_ms,
        "transition_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuid() {
        let path = "/api/decisions/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/decisions/:id");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/api/sessions/feedback"), "/api/sessions/feedback");
    }
}
