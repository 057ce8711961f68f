//! Dashboard API Endpoints
//!
//! Read-only REST + SSE surface over the observability hub.

pub mod health;
pub mod logs;
pub mod status;
pub mod stream;

use crate::observer::Hub;
use axum::{routing::get, Router};
use std::sync::Arc;

pub use health::{health_router, HealthResponse};
pub use logs::{get_logs, LogHistoryResponse, LogQuery};
pub use status::{current_status, status_handler, AgentStatus, StatusResponse};
pub use stream::{stream_logs, stream_router, stream_status};

/// Create the full API router with all endpoints
///
/// Routes:
/// - GET /health - Health check with version and uptime
/// - GET /healthz - Liveness probe
/// - GET /readyz - Readiness probe (agent logged in)
/// - GET /status - Agent connection status
/// - GET /logs - Filtered log history
/// - GET /stream/logs - Live log tail (SSE)
/// - GET /stream/status - Status changes (SSE)
pub fn api_router(hub: Arc<Hub>) -> Router {
    let query_router = Router::new()
        .route("/status", get(status_handler))
        .route("/logs", get(get_logs))
        .with_state(hub.clone());

    health_router(hub.clone())
        .merge(query_router)
        .merge(stream_router(hub))
}
