//! Health Check API
//!
//! Liveness/readiness probes for monitoring and process supervisors.

use crate::observer::Hub;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status
    pub status: &'static str,
    /// Application version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

/// Health check handler
///
/// Always 200 while the process serves requests.
pub async fn health_check(State(hub): State<Arc<Hub>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
        uptime_secs: hub.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Liveness probe (minimal response)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe
///
/// 200 once the agent holds a logged-in session, 503 otherwise.
pub async fn readiness(State(hub): State<Arc<Hub>>) -> StatusCode {
    if hub.snapshot().status.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Create health check router
pub fn health_router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .with_state(hub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{EventSink, StatusUpdate};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_body() {
        let app = health_router(Hub::with_defaults());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], VERSION);
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn test_readiness_follows_connection() {
        let hub = Hub::with_defaults();
        assert_eq!(
            get_status(health_router(hub.clone()), "/readyz").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        hub.status_changed(StatusUpdate::connected("Wanderer"));
        assert_eq!(get_status(health_router(hub.clone()), "/readyz").await, StatusCode::OK);
        assert_eq!(get_status(health_router(hub), "/healthz").await, StatusCode::OK);
    }
}
