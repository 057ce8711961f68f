//! Navigation Target Picker
//!
//! Picks a random point within a radius of the spawn reference point and
//! finds a height the agent can stand at by probing the block column.

use crate::world::{BlockInfo, GoalNear, Vec3, WorldHandle};
use rand::Rng;
use std::f64::consts::TAU;

/// Highest probe offset above the reference height
pub const PROBE_TOP: i64 = 3;
/// Lowest probe offset below the reference height
pub const PROBE_BOTTOM: i64 = -5;
/// How close the navigator has to get to count as arrived
pub const ARRIVAL_RANGE: f64 = 1.0;

/// Horizontal offset from the reference point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    /// Radians in [0, 2π)
    pub angle: f64,
    /// Blocks in [0, radius]
    pub distance: f64,
}

impl Destination {
    /// Uniform angle and uniform distance within `radius`
    pub fn random<R: Rng>(rng: &mut R, radius: f64) -> Self {
        Self {
            angle: rng.gen_range(0.0..TAU),
            distance: rng.gen::<f64>() * radius.max(0.0),
        }
    }

    /// Target x/z relative to `origin`
    pub fn horizontal_target(&self, origin: Vec3) -> (f64, f64) {
        (
            origin.x + self.angle.cos() * self.distance,
            origin.z + self.angle.sin() * self.distance,
        )
    }

    /// Full 3D target with a probed landing height
    pub fn resolve(&self, origin: Vec3, world: &dyn WorldHandle) -> Vec3 {
        let (x, z) = self.horizontal_target(origin);
        let y = safe_height(origin, x, z, |pos| world.block_at(pos));
        Vec3::new(x, y, z)
    }
}

/// Scan from `PROBE_TOP` down to `PROBE_BOTTOM` at (x, z); stand one above
/// the first solid block. Falls back to the origin height.
pub fn safe_height<F>(origin: Vec3, x: f64, z: f64, probe: F) -> f64
where
    F: Fn(Vec3) -> Option<BlockInfo>,
{
    for dy in (PROBE_BOTTOM..=PROBE_TOP).rev() {
        let y = origin.y + dy as f64;
        let solid = probe(Vec3::new(x, y, z)).is_some_and(|block| block.is_solid());
        if solid {
            return y + 1.0;
        }
    }
    origin.y
}

/// Goal handed to the navigator
pub fn goal_for(target: Vec3) -> GoalNear {
    GoalNear::new(target, ARRIVAL_RANGE)
}
