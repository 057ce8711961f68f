//! Wanderbot
//!
//! Autonomous idle agent for a voxel-world game server.
//!
//! # Features
//!
//! - **Session lifecycle**: login, spawn, death/respawn, teardown as a pure state machine
//! - **Reconnection**: linear backoff with a ceiling, one pending timer at a time
//! - **Idle behaviors**: walk, jump, crouch and chat on a randomized schedule
//! - **Observability**: log + status fan-out to a read-only web dashboard
//!
//! # Architecture
//!
//! ```text
//! World server ──► WorldConnector ──► Agent ──► SessionMachine
//!                   (traits)            │
//!                                       ├── ReconnectPolicy (backoff)
//!                                       ├── ActionScheduler (interval + weights)
//!                                       ├── behaviors (walk/jump/crouch/chat)
//!                                       └── EventSink ──► Hub ──► Dashboard (SSE)
//! ```

pub mod agent;
pub mod behaviors;
pub mod config;
pub mod dashboard;
pub mod navigation;
pub mod observer;
pub mod reconnect;
pub mod scheduler;
pub mod session;
pub mod supervisor;
pub mod world;

pub use agent::Agent;
pub use config::Config;
pub use dashboard::{DashboardConfig, DashboardServer};
pub use observer::{EventSink, Hub, LogEvent, LogLevel, StatusEvent, StatusUpdate};
pub use reconnect::{ReconnectPolicy, ReconnectState};
pub use scheduler::{ActionScheduler, Behavior, Decision};
pub use session::{Session, SessionEvent, SessionMachine, State};
pub use world::{
    ConnectOptions, OfflineWorld, OfflineWorldConfig, Vec3, WorldConnector, WorldError, WorldEvent,
    WorldHandle,
};
