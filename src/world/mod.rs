//! World Model Types
//!
//! Plain value types shared between the agent core and whichever
//! protocol client drives it:
//! - `Vec3` positions
//! - `WorldEvent` lifecycle notifications
//! - `Control`, `BlockInfo`, `MovementPolicy`, `GoalNear`
//!
//! The `offline` client implements the traits in-process.

pub mod offline;
pub mod traits;

pub use offline::{OfflineHandle, OfflineWorld, OfflineWorldConfig};
pub use traits::{ConnectOptions, Connection, Navigator, WorldConnector, WorldError, WorldHandle};

use serde::Serialize;
use std::fmt;

/// A point in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Copy shifted by the given deltas
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn distance_to(&self, other: Vec3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Integer block coordinates containing this point
    pub fn block_coords(&self) -> (i64, i64, i64) {
        (
            self.x.floor() as i64,
            self.y.floor() as i64,
            self.z.floor() as i64,
        )
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.x.round(),
            self.y.round(),
            self.z.round()
        )
    }
}

/// Lifecycle notifications emitted by a connection
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Login,
    Spawn,
    Death,
    /// Fixed-rate simulation clock
    PhysicsTick,
    Error(String),
    End,
    Kicked(String),
}

/// Movement controls the agent toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Jump,
    Sneak,
}

impl Control {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jump => "jump",
            Self::Sneak => "sneak",
        }
    }
}

/// Block lookup result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub name: String,
}

impl BlockInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Something an entity can stand on
    pub fn is_solid(&self) -> bool {
        !matches!(self.name.as_str(), "air" | "water" | "lava")
    }
}

/// Rules handed to the navigator once the entity has spawned
#[derive(Debug, Clone, PartialEq)]
pub struct MovementPolicy {
    pub allow_free_motion: bool,
    pub allow_parkour: bool,
    pub allow_sprinting: bool,
    /// Blocks the navigator may place to bridge gaps; empty disables scaffolding
    pub scaffolding_blocks: Vec<String>,
}

impl Default for MovementPolicy {
    fn default() -> Self {
        Self {
            allow_free_motion: false,
            allow_parkour: true,
            allow_sprinting: true,
            scaffolding_blocks: Vec::new(),
        }
    }
}

/// Arrive within `range` blocks of `target`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalNear {
    pub target: Vec3,
    pub range: f64,
}

impl GoalNear {
    pub fn new(target: Vec3, range: f64) -> Self {
        Self { target, range }
    }

    pub fn is_reached(&self, position: Vec3) -> bool {
        position.distance_to(self.target) <= self.range
    }
}
