//! Behavior Set
//!
//! Four independent idle behaviors acting on the live session:
//! - **Jump** / **Crouch**: hold a control, release it from a deferred task
//! - **Vocalize**: cooldown + probability gate, random phrase
//! - **Locomotion**: walk to a random safe point near spawn, maybe look around
//!
//! Deferred work holds a `Weak<Session>` and becomes a no-op once the
//! session is gone.

use crate::navigation::{self, Destination};
use crate::observer::{emit, EventSink, LogLevel};
use crate::scheduler::ActionTiming;
use crate::session::{MovingGuard, Session};
use crate::world::{Control, Vec3, WorldError};
use rand::seq::SliceRandom;
use rand::Rng;
use std::f64::consts::{PI, TAU};
use std::ops::RangeInclusive;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Jump hold time in milliseconds
pub const JUMP_HOLD_MS: RangeInclusive<u64> = 200..=800;
/// Sneak hold time in milliseconds
pub const CROUCH_HOLD_MS: RangeInclusive<u64> = 1000..=4000;
/// Minimum gap between two chat lines
pub const VOCALIZE_COOLDOWN: Duration = Duration::from_millis(10_000);
/// Chance of looking around after a successful walk
pub const LOOK_PROBABILITY: f64 = 0.4;

/// Things the agent says
pub const PHRASES: [&str; 10] = [
    "Hello world!",
    "Nice day here!",
    "Just vibing...",
    "Anyone around?",
    "Exploring the area",
    "This place looks cool",
    "AFK but still here",
    "Wandering around",
    "The view here is nice",
    "Peaceful here",
];

/// Press `jump` for a random duration
pub fn jump<R: Rng>(session: &Arc<Session>, rng: &mut R) -> Duration {
    let duration = Duration::from_millis(rng.gen_range(JUMP_HOLD_MS));
    hold_control(session, Control::Jump, duration);
    duration
}

/// Press `sneak` for a random duration
pub fn crouch<R: Rng>(session: &Arc<Session>, rng: &mut R) -> Duration {
    let duration = Duration::from_millis(rng.gen_range(CROUCH_HOLD_MS));
    hold_control(session, Control::Sneak, duration);
    duration
}

/// Press now, release after `duration` unless the session died meanwhile
pub fn hold_control(session: &Arc<Session>, control: Control, duration: Duration) -> JoinHandle<bool> {
    session.handle().set_control_state(control, true);

    let weak: Weak<Session> = Arc::downgrade(session);
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        match weak.upgrade() {
            Some(session) if session.is_live() => {
                session.handle().set_control_state(control, false);
                true
            }
            _ => false,
        }
    })
}

/// Chat a random phrase if both the cooldown and the probability gate pass.
///
/// The timestamp only moves when something is actually said.
pub fn vocalize<R: Rng>(
    session: &Session,
    timing: &mut ActionTiming,
    now: Instant,
    probability: f64,
    rng: &mut R,
) -> Option<&'static str> {
    if timing
        .since_vocalize(now)
        .is_some_and(|elapsed| elapsed < VOCALIZE_COOLDOWN)
    {
        return None;
    }

    if rng.gen::<f64>() >= probability {
        return None;
    }

    let message = *PHRASES.choose(rng)?;
    session.handle().chat(message);
    timing.record_vocalize(now);
    Some(message)
}

/// Random draws for one walk, taken up front so the walk itself is `Send`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WanderPlan {
    pub destination: Destination,
    /// Yaw/pitch to look at after arriving
    pub look: Option<(f64, f64)>,
}

impl WanderPlan {
    pub fn draw<R: Rng>(rng: &mut R, radius: f64) -> Self {
        let destination = Destination::random(rng, radius);
        let look = if rng.gen::<f64>() < LOOK_PROBABILITY {
            let yaw = rng.gen::<f64>() * TAU;
            let pitch = (rng.gen::<f64>() - 0.5) * PI * 0.3;
            Some((yaw, pitch))
        } else {
            None
        };
        Self { destination, look }
    }
}

/// Claim the locomotion flag and walk in the background.
///
/// `None` when a walk is already in flight or the session is closed.
pub fn start_wander(
    session: &Arc<Session>,
    plan: WanderPlan,
    sink: Arc<dyn EventSink>,
) -> Option<JoinHandle<Result<Vec3, WorldError>>> {
    let guard = MovingGuard::acquire(session)?;
    Some(tokio::spawn(wander(guard, plan, sink)))
}

/// Walk to the planned point. Failures are logged, never propagated into
/// session state; the flag clears when `guard` drops on every path.
pub async fn wander(
    guard: MovingGuard,
    plan: WanderPlan,
    sink: Arc<dyn EventSink>,
) -> Result<Vec3, WorldError> {
    let result = walk(guard.session(), plan).await;

    match &result {
        Ok(target) => emit(sink.as_ref(), LogLevel::Info, "Action", format!("Moved to {}", target)),
        Err(e) => emit(
            sink.as_ref(),
            LogLevel::Error,
            "Error",
            format!("Movement failed: {}", e),
        ),
    }

    drop(guard);
    result
}

async fn walk(session: &Arc<Session>, plan: WanderPlan) -> Result<Vec3, WorldError> {
    let origin = session.spawn_point().ok_or(WorldError::NotConnected)?;
    let target = plan.destination.resolve(origin, session.handle());

    session
        .handle()
        .navigator()
        .goto(navigation::goal_for(target))
        .await?;

    if !session.is_live() {
        return Err(WorldError::NotConnected);
    }

    if let Some((yaw, pitch)) = plan.look {
        session.handle().look(yaw, pitch, false);
    }

    Ok(target)
}
