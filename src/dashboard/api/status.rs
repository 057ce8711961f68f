//! Status API
//!
//! Passive, read-only view of the agent session for dashboard clients.

use super::health::VERSION;
use crate::observer::Hub;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Connection state as shown to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Connected,
    Disconnected,
}

/// GET /api/status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: AgentStatus,
    /// Logged-in identity, absent while disconnected
    pub username: Option<String>,
    /// A reconnect timer is pending
    pub reconnecting: bool,
    pub reconnect_attempts: u32,
    /// Process uptime in seconds
    pub uptime_secs: u64,
    pub version: &'static str,
    /// When the status last changed (ISO 8601)
    pub timestamp: String,
}

/// Build the response from the hub snapshot
pub fn current_status(hub: &Hub) -> StatusResponse {
    let snapshot = hub.snapshot();
    let status = snapshot.status;

    StatusResponse {
        status: if status.connected {
            AgentStatus::Connected
        } else {
            AgentStatus::Disconnected
        },
        username: status.username,
        reconnecting: status.reconnecting,
        reconnect_attempts: status.reconnect_attempts,
        uptime_secs: hub.uptime_secs(),
        version: VERSION,
        timestamp: snapshot.timestamp,
    }
}

/// GET /api/status
pub async fn status_handler(State(hub): State<Arc<Hub>>) -> Json<StatusResponse> {
    Json(current_status(&hub))
}
