//! Session State Machine
//!
//! `Idle → Connecting → Authenticated → Active → Terminated → Connecting ...`
//!
//! Transitions are a pure function of (state, event) returning the next
//! state and the side effects to run. The agent runtime executes effects;
//! nothing here touches the network.
//!
//! `Session` is the single live connection: handle, identity, spawn
//! reference point and the locomotion flag.

use crate::world::{Vec3, WorldEvent, WorldHandle};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Wait after a death before re-reading the respawn position
pub const RESPAWN_SETTLE_DELAY: Duration = Duration::from_millis(3000);

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Nothing started yet
    Idle,
    /// Connection created, waiting for login
    Connecting,
    /// Logged in, entity not spawned yet
    Authenticated,
    /// Spawned; behaviors run
    Active,
    /// Connection released, waiting for the reconnect timer
    Terminated,
}

impl State {
    /// A connection handle exists in this state
    pub fn has_connection(&self) -> bool {
        matches!(self, State::Connecting | State::Authenticated | State::Active)
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Create a session (initial start or reconnect timer)
    Start,
    Login,
    Spawn,
    Death,
    Tick,
    /// Settle delay after a death has elapsed
    RespawnSettled,
    Error(String),
    End,
    Kicked(String),
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Error(_) | SessionEvent::End | SessionEvent::Kicked(_)
        )
    }
}

impl From<WorldEvent> for SessionEvent {
    fn from(event: WorldEvent) -> Self {
        match event {
            WorldEvent::Login => SessionEvent::Login,
            WorldEvent::Spawn => SessionEvent::Spawn,
            WorldEvent::Death => SessionEvent::Death,
            WorldEvent::PhysicsTick => SessionEvent::Tick,
            WorldEvent::Error(reason) => SessionEvent::Error(reason),
            WorldEvent::End => SessionEvent::End,
            WorldEvent::Kicked(reason) => SessionEvent::Kicked(reason),
        }
    }
}

/// Side effects requested by a transition, run in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Create the connection and register observers
    Connect,
    ResetReconnect,
    AnnounceConnected,
    CaptureSpawnPoint,
    ConfigureNavigation,
    ScheduleRespawnCapture,
    RecaptureSpawnPoint,
    RunScheduler,
    /// Quit the handle and clear the session
    Teardown,
    ScheduleReconnect,
    AnnounceDisconnected,
}

/// Result of feeding one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: State,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: State, effects: &[Effect]) -> Self {
        Self {
            next,
            effects: effects.to_vec(),
        }
    }

    fn stay(state: State) -> Self {
        Self::to(state, &[])
    }
}

/// Transition table
pub fn transition(state: State, event: &SessionEvent) -> Transition {
    use Effect::*;
    use SessionEvent as E;
    use State as S;

    match (state, event) {
        (S::Idle | S::Terminated, E::Start) => Transition::to(S::Connecting, &[Connect]),

        (S::Connecting, E::Login) => {
            Transition::to(S::Authenticated, &[ResetReconnect, AnnounceConnected])
        }

        (S::Authenticated, E::Spawn) => {
            Transition::to(S::Active, &[CaptureSpawnPoint, ConfigureNavigation])
        }
        (S::Active, E::Spawn) => Transition::to(S::Active, &[CaptureSpawnPoint]),

        (S::Authenticated | S::Active, E::Death) => {
            Transition::to(state, &[ScheduleRespawnCapture])
        }
        (S::Authenticated | S::Active, E::RespawnSettled) => {
            Transition::to(state, &[RecaptureSpawnPoint])
        }

        (S::Active, E::Tick) => Transition::to(S::Active, &[RunScheduler]),

        (S::Connecting | S::Authenticated | S::Active, e) if e.is_terminal() => Transition::to(
            S::Terminated,
            &[Teardown, ScheduleReconnect, AnnounceDisconnected],
        ),

        _ => Transition::stay(state),
    }
}

/// Holds the current state and logs transitions
#[derive(Debug)]
pub struct SessionMachine {
    state: State,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Feed an event, returning the effects to execute
    pub fn apply(&mut self, event: &SessionEvent) -> Vec<Effect> {
        let Transition { next, effects } = transition(self.state, event);
        if next != self.state {
            debug!("Session: {:?} -> {:?} on {:?}", self.state, next, event);
        } else if effects.is_empty() && !matches!(event, SessionEvent::Tick) {
            debug!("Session: {:?} ignored in {:?}", event, self.state);
        }
        self.state = next;
        effects
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// The single live agent connection
pub struct Session {
    id: Uuid,
    username: String,
    handle: Arc<dyn WorldHandle>,
    spawn_point: Mutex<Option<Vec3>>,
    moving: AtomicBool,
    closed: AtomicBool,
}

impl Session {
    pub fn new(username: impl Into<String>, handle: Arc<dyn WorldHandle>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            username: username.into(),
            handle,
            spawn_point: Mutex::new(None),
            moving: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configured identity until the server confirms one
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn handle(&self) -> &dyn WorldHandle {
        self.handle.as_ref()
    }

    pub fn spawn_point(&self) -> Option<Vec3> {
        *self.spawn_point.lock()
    }

    pub fn set_spawn_point(&self, point: Vec3) {
        *self.spawn_point.lock() = Some(point);
    }

    pub fn is_moving(&self) -> bool {
        self.moving.load(Ordering::Acquire)
    }

    /// False once the session has been torn down
    pub fn is_live(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Mark closed, clear state and quit the handle. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.spawn_point.lock() = None;
        self.moving.store(false, Ordering::Release);
        self.handle.quit();
    }
}

/// Holds the locomotion flag for as long as it lives
pub struct MovingGuard {
    session: Arc<Session>,
}

impl MovingGuard {
    /// `None` if a walk is already in flight or the session is closed
    pub fn acquire(session: &Arc<Session>) -> Option<Self> {
        if !session.is_live() {
            return None;
        }
        session
            .moving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                session: Arc::clone(session),
            })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Drop for MovingGuard {
    fn drop(&mut self) {
        self.session.moving.store(false, Ordering::Release);
    }
}
