//! Observability Hub
//!
//! Push-only fan-out of agent log lines and connection status to the
//! dashboard, plus a passive snapshot for status queries.
//!
//! ```text
//! Agent ──► EventSink ──► Hub ──┬── broadcast<LogEvent>    ──► /api/stream/logs
//!                               ├── broadcast<StatusEvent> ──► /api/stream/status
//!                               ├── history (ring buffer)  ──► /api/logs
//!                               └── snapshot               ──► /api/status
//! ```

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Log level, ordered by severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Log line pushed to subscribers
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    /// Log level
    pub level: LogLevel,
    /// Emitting module, e.g. "Bot", "Action", "Error"
    pub module: String,
    /// Log message
    pub message: String,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

impl LogEvent {
    /// Create a new log event stamped with the current time
    pub fn new(level: LogLevel, module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            module: module.into(),
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn info(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, module, message)
    }

    pub fn warn(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, module, message)
    }

    pub fn error(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, module, message)
    }
}

/// Connection status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub connected: bool,
    pub username: Option<String>,
    pub reconnecting: bool,
    pub reconnect_attempts: u32,
}

impl StatusUpdate {
    pub fn connected(username: impl Into<String>) -> Self {
        Self {
            connected: true,
            username: Some(username.into()),
            reconnecting: false,
            reconnect_attempts: 0,
        }
    }

    pub fn disconnected(reconnect_attempts: u32) -> Self {
        Self {
            connected: false,
            username: None,
            reconnecting: true,
            reconnect_attempts,
        }
    }
}

/// Status as broadcast and stored, with the time it changed
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    #[serde(flatten)]
    pub status: StatusUpdate,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

impl StatusEvent {
    fn now(status: StatusUpdate) -> Self {
        Self {
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Receiver side of the observability transport
pub trait EventSink: Send + Sync {
    /// Fire-and-forget log line
    fn log_event(&self, event: LogEvent);

    /// Fire-and-forget status change
    fn status_changed(&self, status: StatusUpdate);
}

/// Write a line to tracing and push it to the sink
pub fn emit(sink: &dyn EventSink, level: LogLevel, module: &str, message: impl Into<String>) {
    let message = message.into();
    match level {
        LogLevel::Debug => debug!(module, "{}", message),
        LogLevel::Info => info!(module, "{}", message),
        LogLevel::Warn => warn!(module, "{}", message),
        LogLevel::Error => error!(module, "{}", message),
    }
    sink.log_event(LogEvent::new(level, module, message));
}

/// Default history size
pub const DEFAULT_HISTORY: usize = 500;

/// Broadcast hub backing the dashboard
pub struct Hub {
    log_tx: broadcast::Sender<LogEvent>,
    status_tx: broadcast::Sender<StatusEvent>,
    status: RwLock<StatusEvent>,
    history: Mutex<VecDeque<LogEvent>>,
    history_limit: usize,
    start_time: Instant,
}

impl Hub {
    /// Create a hub keeping up to `history_limit` log lines
    pub fn new(history_limit: usize) -> Arc<Self> {
        let (log_tx, _) = broadcast::channel(256);
        let (status_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            log_tx,
            status_tx,
            status: RwLock::new(StatusEvent::now(StatusUpdate {
                connected: false,
                username: None,
                reconnecting: false,
                reconnect_attempts: 0,
            })),
            history: Mutex::new(VecDeque::with_capacity(history_limit)),
            history_limit,
            start_time: Instant::now(),
        })
    }

    /// Create with default history size
    pub fn with_defaults() -> Arc<Self> {
        Self::new(DEFAULT_HISTORY)
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEvent> {
        self.log_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    /// Current status (read-only)
    pub fn snapshot(&self) -> StatusEvent {
        self.status.read().clone()
    }

    /// Most recent log lines, oldest first
    pub fn recent_logs(&self, limit: usize) -> Vec<LogEvent> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EventSink for Hub {
    fn log_event(&self, event: LogEvent) {
        {
            let mut history = self.history.lock();
            if history.len() == self.history_limit {
                history.pop_front();
            }
            if self.history_limit > 0 {
                history.push_back(event.clone());
            }
        }
        // No subscribers is fine
        let _ = self.log_tx.send(event);
    }

    fn status_changed(&self, status: StatusUpdate) {
        let event = StatusEvent::now(status);
        *self.status.write() = event.clone();
        let _ = self.status_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_creation() {
        let info = LogEvent::info("Bot", "Bot spawned successfully");
        assert_eq!(info.level, LogLevel::Info);
        assert_eq!(info.module, "Bot");

        let error = LogEvent::error("Error", "Movement failed");
        assert_eq!(error.level, LogLevel::Error);
    }

    #[test]
    fn test_log_level_serialization() {
        assert_eq!(serde_json::to_string(&LogLevel::Info).unwrap(), "\"info\"");
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"warn\"");
        assert_eq!(serde_json::to_string(&LogLevel::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_initial_snapshot_disconnected() {
        let hub = Hub::with_defaults();
        let snapshot = hub.snapshot();
        assert!(!snapshot.status.connected);
        assert!(snapshot.status.username.is_none());
        assert!(!snapshot.status.reconnecting);
    }

    #[test]
    fn test_status_changed_updates_snapshot() {
        let hub = Hub::with_defaults();
        hub.status_changed(StatusUpdate::connected("Wanderer"));
        assert_eq!(hub.snapshot().status.username.as_deref(), Some("Wanderer"));

        hub.status_changed(StatusUpdate::disconnected(3));
        let snapshot = hub.snapshot();
        assert!(!snapshot.status.connected);
        assert!(snapshot.status.reconnecting);
        assert_eq!(snapshot.status.reconnect_attempts, 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let hub = Hub::new(3);
        for i in 0..5 {
            hub.log_event(LogEvent::info("Action", format!("line {}", i)));
        }

        let recent = hub.recent_logs(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "line 2");
        assert_eq!(recent[2].message, "line 4");

        let last = hub.recent_logs(1);
        assert_eq!(last[0].message, "line 4");
    }

    #[tokio::test]
    async fn test_broadcast_log_events() {
        let hub = Hub::with_defaults();
        let mut rx = hub.subscribe_logs();

        emit(hub.as_ref(), LogLevel::Info, "Server", "Dashboard running");

        let received = rx.recv().await.unwrap();
        assert_eq!(received.module, "Server");
        assert_eq!(received.message, "Dashboard running");
    }

    #[tokio::test]
    async fn test_broadcast_status_events() {
        let hub = Hub::with_defaults();
        let mut rx = hub.subscribe_status();

        hub.status_changed(StatusUpdate::connected("Wanderer"));

        let received = rx.recv().await.unwrap();
        assert!(received.status.connected);
    }

    #[test]
    fn test_status_event_flattens() {
        let event = StatusEvent::now(StatusUpdate::connected("Wanderer"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"connected\":true"));
        assert!(json.contains("\"username\":\"Wanderer\""));
        assert!(json.contains("\"timestamp\""));
    }
}
