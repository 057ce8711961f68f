//! Server-Sent Events (SSE) Streaming
//!
//! Push channels for dashboard clients:
//! - `/stream/logs`: live tail of agent log lines
//! - `/stream/status`: current status on connect, then every change
//!
//! Browsers reconnect an EventSource on their own; keep-alive comments
//! replace an explicit ping/pong.

use super::logs::LogQuery;
use crate::observer::{Hub, StatusEvent};
use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures_util::stream::{self, Stream};
use serde::Serialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Type alias for boxed SSE stream
type BoxedSseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// Keep-alive comment interval
const KEEP_ALIVE: Duration = Duration::from_secs(30);

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .data(serde_json::to_string(payload).unwrap_or_default())
}

fn lagged_event(what: &str) -> Event {
    Event::default()
        .event("warning")
        .data(format!(r#"{{"message":"Some {} were skipped"}}"#, what))
}

fn sse(stream: BoxedSseStream) -> Response {
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("heartbeat"))
        .into_response()
}

/// GET /api/stream/logs - Log tail stream
///
/// Accepts the same filters as `/api/logs` (limit is ignored).
pub async fn stream_logs(State(hub): State<Arc<Hub>>, Query(query): Query<LogQuery>) -> Response {
    let rx = hub.subscribe_logs();

    let s = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(log) if query.matches(&log) => Some(Ok::<_, Infallible>(json_event("log", &log))),
        Ok(_) => None,
        Err(_) => Some(Ok(lagged_event("logs"))),
    });

    sse(Box::pin(s))
}

/// GET /api/stream/status - Status stream
///
/// The first event is the current snapshot.
pub async fn stream_status(State(hub): State<Arc<Hub>>) -> Response {
    // Subscribe before reading the snapshot so no change slips between them
    let rx = hub.subscribe_status();
    let initial: StatusEvent = hub.snapshot();

    let first = stream::once(async move { Ok::<_, Infallible>(json_event("status", &initial)) });
    let changes = BroadcastStream::new(rx).map(|result| {
        Ok::<_, Infallible>(match result {
            Ok(status) => json_event("status", &status),
            Err(_) => lagged_event("status updates"),
        })
    });

    sse(Box::pin(first.chain(changes)))
}

/// Create SSE stream router
pub fn stream_router(hub: Arc<Hub>) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/stream/logs", get(stream_logs))
        .route("/stream/status", get(stream_status))
        .with_state(hub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{EventSink, LogEvent, StatusUpdate};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    async fn open(hub: Arc<Hub>, uri: &str) -> Response {
        stream_router(hub)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn next_chunk(body: &mut axum::body::BodyDataStream) -> String {
        let chunk = body.next().await.unwrap().unwrap();
        String::from_utf8_lossy(&chunk).into_owned()
    }

    #[tokio::test]
    async fn test_status_stream_starts_with_snapshot() {
        let hub = Hub::with_defaults();
        hub.status_changed(StatusUpdate::connected("Wanderer"));

        let response = open(hub.clone(), "/stream/status").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let mut body = response.into_body().into_data_stream();
        let first = next_chunk(&mut body).await;
        assert!(first.contains("event: status"));
        assert!(first.contains("\"connected\":true"));

        hub.status_changed(StatusUpdate::disconnected(1));
        let second = next_chunk(&mut body).await;
        assert!(second.contains("\"connected\":false"));
        assert!(second.contains("\"reconnect_attempts\":1"));
    }

    #[tokio::test]
    async fn test_log_stream_applies_filter() {
        let hub = Hub::with_defaults();
        let response = open(hub.clone(), "/stream/logs?module=Action").await;
        let mut body = response.into_body().into_data_stream();

        hub.log_event(LogEvent::info("Bot", "Logged in as Wanderer"));
        hub.log_event(LogEvent::info("Action", "Jumped for 300ms"));

        let chunk = next_chunk(&mut body).await;
        assert!(chunk.contains("event: log"));
        assert!(chunk.contains("Jumped for 300ms"));
    }
}
