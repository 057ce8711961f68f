//! Dashboard Configuration
//!
//! Localhost-only by default; the dashboard is read-only and unauthenticated.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Dashboard server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Bind address (default: 127.0.0.1)
    pub bind_addr: IpAddr,
    /// Port number (default: 3000)
    pub port: u16,
    /// Restrict CORS to `cors_origins`
    pub cors_enabled: bool,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Enable request logging
    pub log_requests: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            cors_enabled: true,
            cors_origins: local_origins(3000),
            log_requests: true,
        }
    }
}

fn local_origins(port: u16) -> Vec<String> {
    vec![
        format!("http://localhost:{}", port),
        format!("http://127.0.0.1:{}", port),
    ]
}

impl DashboardConfig {
    /// Create config from environment variables
    ///
    /// `DASHBOARD_PORT` wins over the generic `PORT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("DASHBOARD_BIND_ADDR") {
            if let Ok(parsed) = addr.parse() {
                config.bind_addr = parsed;
            }
        }

        for key in ["PORT", "DASHBOARD_PORT"] {
            if let Ok(port) = std::env::var(key) {
                if let Ok(parsed) = port.trim().parse() {
                    config.port = parsed;
                }
            }
        }
        config.cors_origins = local_origins(config.port);

        if let Ok(val) = std::env::var("DASHBOARD_LOG_REQUESTS") {
            config.log_requests = val == "true" || val == "1";
        }

        if !config.is_localhost() {
            tracing::warn!(
                "Dashboard binding to {} - status and logs are readable without authentication",
                config.bind_addr
            );
        }

        config
    }

    /// Check if bound to localhost only
    pub fn is_localhost(&self) -> bool {
        self.bind_addr.is_loopback()
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.socket_addr())
    }
}
