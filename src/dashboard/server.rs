//! Dashboard HTTP Server
//!
//! Axum-based server with embedded static files, CORS, and graceful shutdown.

use crate::dashboard::api::api_router;
use crate::dashboard::config::DashboardConfig;
use crate::observer::{emit, Hub, LogLevel};
use axum::{
    body::Body,
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use rust_embed::Embed;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Embedded static files for the dashboard
#[derive(Embed)]
#[folder = "src/dashboard/static/"]
struct StaticAssets;

/// Dashboard server
pub struct DashboardServer {
    config: DashboardConfig,
    hub: Arc<Hub>,
}

impl DashboardServer {
    pub fn new(config: DashboardConfig, hub: Arc<Hub>) -> Self {
        Self { config, hub }
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        let cors = if self.config.cors_enabled {
            CorsLayer::new()
                .allow_origin(
                    self.config
                        .cors_origins
                        .iter()
                        .filter_map(|o| o.parse().ok())
                        .collect::<Vec<_>>(),
                )
                .allow_methods([Method::GET])
                .allow_headers([header::CONTENT_TYPE])
        } else {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers([header::CONTENT_TYPE])
        };

        let mut router = Router::new()
            .route("/", get(index_handler))
            .route("/{*path}", get(static_handler))
            .nest("/api", api_router(self.hub.clone()))
            .layer(cors);

        if self.config.log_requests {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown` flips to true (or its sender is dropped)
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let router = self.build_router();

        if !self.config.is_localhost() {
            warn!("Dashboard bound to {} - reachable from the network", addr);
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        emit(
            self.hub.as_ref(),
            LogLevel::Info,
            "Server",
            format!("Dashboard running at {}", self.config.base_url()),
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                // Err means the sender is gone, which also ends the process
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await?;

        emit(
            self.hub.as_ref(),
            LogLevel::Info,
            "Server",
            "Dashboard server shut down gracefully",
        );
        Ok(())
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }
}

/// Serve the index.html file
async fn index_handler() -> impl IntoResponse {
    match StaticAssets::get("index.html") {
        Some(content) => Html(content.data.into_owned()).into_response(),
        None => Html(FALLBACK_INDEX).into_response(),
    }
}

/// Serve static files from embedded assets
async fn static_handler(axum::extract::Path(path): axum::extract::Path<String>) -> Response {
    let path = path.trim_start_matches('/');

    if path.contains("..") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match StaticAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream().to_string();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime),
                    (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                Body::from(content.data.into_owned()),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Fallback index page when no static files are embedded
const FALLBACK_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Wanderbot</title></head>
<body>
    <h1>Wanderbot</h1>
    <p>The dashboard UI is not installed. API: <a href="/api/status">/api/status</a></p>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        DashboardServer::new(DashboardConfig::default(), Hub::with_defaults()).build_router()
    }

    async fn get(uri: &str) -> Response {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = get("/api/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_status_endpoint_disconnected_at_boot() {
        let response = get("/api/status").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "disconnected");
        assert!(json["username"].is_null());
    }

    #[tokio::test]
    async fn test_index_returns_html() {
        let response = get("/").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("Wanderbot"));
    }

    #[tokio::test]
    async fn test_path_traversal_blocked() {
        let response = get("/../../etc/passwd").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_file_returns_404() {
        let response = get("/nonexistent.js").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let config = DashboardConfig {
            port: 0,
            ..Default::default()
        };
        let hub = Hub::with_defaults();
        let server = DashboardServer::new(config, hub.clone());
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(server.run(rx));
        tx.send(true).unwrap();
        assert!(task.await.unwrap().is_ok());

        let logs = hub.recent_logs(10);
        assert!(logs
            .iter()
            .any(|l| l.module == "Server" && l.message.starts_with("Dashboard running at http://")));
        assert_eq!(
            logs.last().unwrap().message,
            "Dashboard server shut down gracefully"
        );
    }
}
