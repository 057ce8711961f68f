//! Log History API
//!
//! Recent agent log lines from the hub's ring buffer, with filtering.
//! The same filter applies to the live tail in stream.rs.

use crate::observer::{Hub, LogEvent, LogLevel};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hard cap on returned entries
pub const MAX_LIMIT: usize = 500;

/// Query parameters shared by history and stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    /// Minimum level (debug/info/warn/error)
    #[serde(default)]
    pub level: Option<LogLevel>,
    /// Only lines from this module, case-insensitive
    #[serde(default)]
    pub module: Option<String>,
    /// Substring match on the message, case-insensitive
    #[serde(default)]
    pub search: Option<String>,
    /// Maximum entries to return (default 100)
    #[serde(default)]
    pub limit: Option<usize>,
}

impl LogQuery {
    pub fn matches(&self, event: &LogEvent) -> bool {
        if self.level.is_some_and(|min| event.level < min) {
            return false;
        }
        if let Some(module) = &self.module {
            if !event.module.eq_ignore_ascii_case(module) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !event.message.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or(100).min(MAX_LIMIT)
    }
}

/// GET /api/logs response
#[derive(Debug, Serialize)]
pub struct LogHistoryResponse {
    /// Oldest first
    pub entries: Vec<LogEvent>,
    pub count: usize,
}

/// Filter the buffered history and keep the newest `limit` matches
pub fn history(hub: &Hub, query: &LogQuery) -> Vec<LogEvent> {
    let matching: Vec<LogEvent> = hub
        .recent_logs(usize::MAX)
        .into_iter()
        .filter(|e| query.matches(e))
        .collect();
    let skip = matching.len().saturating_sub(query.limit());
    matching.into_iter().skip(skip).collect()
}

/// GET /api/logs
pub async fn get_logs(
    State(hub): State<Arc<Hub>>,
    Query(query): Query<LogQuery>,
) -> Json<LogHistoryResponse> {
    let entries = history(&hub, &query);
    Json(LogHistoryResponse {
        count: entries.len(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::EventSink;

    fn seeded_hub() -> Arc<Hub> {
        let hub = Hub::with_defaults();
        hub.log_event(LogEvent::info("Bot", "Logged in as Wanderer"));
        hub.log_event(LogEvent::info("Action", "Jumped for 420ms"));
        hub.log_event(LogEvent::error("Error", "Movement failed: No path to the goal!"));
        hub.log_event(LogEvent::info("Action", "Sneaking for 2100ms"));
        hub
    }

    #[test]
    fn test_unfiltered_history() {
        let hub = seeded_hub();
        let entries = history(&hub, &LogQuery::default());
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].message, "Logged in as Wanderer");
    }

    #[test]
    fn test_filter_by_level() {
        let hub = seeded_hub();
        let query = LogQuery {
            level: Some(LogLevel::Warn),
            ..Default::default()
        };
        let entries = history(&hub, &query);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].module, "Error");
    }

    #[test]
    fn test_filter_by_module_and_search() {
        let hub = seeded_hub();
        let query = LogQuery {
            module: Some("action".into()),
            search: Some("SNEAK".into()),
            ..Default::default()
        };
        let entries = history(&hub, &query);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Sneaking for 2100ms");
    }

    #[test]
    fn test_limit_keeps_newest() {
        let hub = seeded_hub();
        let query = LogQuery {
            limit: Some(2),
            ..Default::default()
        };
        let entries = history(&hub, &query);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].message, "Sneaking for 2100ms");
    }
}
