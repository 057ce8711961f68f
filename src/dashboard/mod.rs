//! Web Dashboard Module
//!
//! Local, read-only window onto the running agent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Dashboard Server              │
//! ├─────────────────────────────────────────┤
//! │  GET /                  → Static files  │
//! │  GET /api/health        → Health check  │
//! │  GET /api/healthz       → Liveness      │
//! │  GET /api/readyz        → Readiness     │
//! │  GET /api/status        → Agent status  │
//! │  GET /api/logs          → Log history   │
//! │  GET /api/stream/logs   → Log tail (SSE)│
//! │  GET /api/stream/status → Status (SSE)  │
//! └─────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod server;

pub use api::{api_router, AgentStatus, HealthResponse, LogHistoryResponse, LogQuery, StatusResponse};
pub use config::DashboardConfig;
pub use server::DashboardServer;
