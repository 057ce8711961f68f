//! World Collaborator Traits
//!
//! Narrow interfaces the agent consumes from the world-protocol client.
//! Protocol parsing and path planning live behind these seams.

use super::{BlockInfo, Control, GoalNear, MovementPolicy, Vec3, WorldEvent};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Error types for world operations
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Where and as whom to connect
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Account name the agent logs in as
    pub username: String,
    /// Optional account password (offline-mode servers need none)
    pub password: Option<String>,
    /// Protocol version string, e.g. "1.20.1"
    pub version: String,
}

impl ConnectOptions {
    /// `host:port` form used in log lines
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A freshly established connection: the handle plus its lifecycle events
pub struct Connection {
    pub handle: Arc<dyn WorldHandle>,
    pub events: mpsc::UnboundedReceiver<WorldEvent>,
}

/// Creates connections - implement for each protocol client
#[async_trait]
pub trait WorldConnector: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<Connection, WorldError>;
}

/// Live connection handle
pub trait WorldHandle: Send + Sync {
    /// Name the server accepted us under
    fn username(&self) -> String;

    /// Current entity position, `None` before the entity exists
    fn position(&self) -> Option<Vec3>;

    /// Press or release a movement control
    fn set_control_state(&self, control: Control, state: bool);

    /// Send a chat line
    fn chat(&self, text: &str);

    /// Turn the head
    fn look(&self, yaw: f64, pitch: f64, smooth: bool);

    /// Block at a world position, `None` when the chunk is not loaded
    fn block_at(&self, position: Vec3) -> Option<BlockInfo>;

    /// Close the connection. Must be safe to call more than once.
    fn quit(&self);

    /// Navigation sub-interface bound to this connection
    fn navigator(&self) -> &dyn Navigator;
}

/// Path-following collaborator
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Replace the movement rules used by subsequent goals
    fn set_movement_policy(&self, policy: MovementPolicy);

    /// Walk to the goal; resolves on arrival or failure
    async fn goto(&self, goal: GoalNear) -> Result<(), WorldError>;
}
