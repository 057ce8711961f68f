//! Agent Runtime
//!
//! The one task that owns the session context. World events, the physics
//! tick, respawn-settle notifications and the reconnect timer are all
//! funnelled through `step`, so session state, reconnect attempts and action
//! timing each have a single writer.
//!
//! ```text
//!  WorldConnector ──events──┐
//!  respawn settle ──────────┼──► step() ──► SessionMachine ──► effects
//!  reconnect deadline ──────┤                                   │
//!  shutdown (watch) ────────┘            ActionScheduler ◄── RunScheduler
//!                                             │
//!                                         behaviors ──► WorldHandle
//! ```

use crate::behaviors::{self, WanderPlan};
use crate::config::Config;
use crate::observer::{emit, EventSink, LogLevel, StatusUpdate};
use crate::reconnect::{ReconnectPolicy, ReconnectState};
use crate::scheduler::{ActionScheduler, Behavior, Decision};
use crate::session::{Effect, Session, SessionEvent, SessionMachine, State, RESPAWN_SETTLE_DELAY};
use crate::world::{ConnectOptions, MovementPolicy, WorldConnector, WorldError, WorldEvent};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Notifications the agent sends itself from deferred tasks
#[derive(Debug)]
enum Internal {
    RespawnSettled(Uuid),
}

/// What woke the loop
enum Step {
    Signal { sender_alive: bool },
    World(Option<WorldEvent>),
    Internal(Internal),
    Reconnect,
}

/// Autonomous agent: session lifecycle + idle behavior scheduling
pub struct Agent {
    config: Config,
    options: ConnectOptions,
    policy: ReconnectPolicy,
    connector: Arc<dyn WorldConnector>,
    sink: Arc<dyn EventSink>,
    machine: SessionMachine,
    session: Option<Arc<Session>>,
    world_events: Option<mpsc::UnboundedReceiver<WorldEvent>>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    reconnect: ReconnectState,
    reconnect_at: Option<Instant>,
    scheduler: ActionScheduler,
    rng: StdRng,
}

impl Agent {
    pub fn new(config: Config, connector: Arc<dyn WorldConnector>, sink: Arc<dyn EventSink>) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            options: config.connect_options(),
            policy: config.reconnect_policy(),
            scheduler: ActionScheduler::new(config.action_interval_min, config.action_interval_max),
            config,
            connector,
            sink,
            machine: SessionMachine::new(),
            session: None,
            world_events: None,
            internal_tx,
            internal_rx,
            reconnect: ReconnectState::new(),
            reconnect_at: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic randomness
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    /// Live session, if any
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.clone()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect.attempts()
    }

    /// Time left on the pending reconnect timer
    pub fn reconnect_in(&self) -> Option<Duration> {
        self.reconnect_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn scheduler(&self) -> &ActionScheduler {
        &self.scheduler
    }

    /// Run until shutdown is signalled
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Agent starting for {} on {}",
            self.options.username,
            self.options.endpoint()
        );
        self.start().await;
        while self.step(&mut shutdown).await {}
        self.stop();
    }

    /// Create a session. No-op while one exists.
    pub async fn start(&mut self) {
        let effects = self.machine.apply(&SessionEvent::Start);
        if !effects.contains(&Effect::Connect) {
            debug!("Start ignored in {:?}: session already exists", self.state());
            return;
        }

        self.log(LogLevel::Info, "Bot", "Creating new bot instance...");

        match self.connector.connect(&self.options).await {
            Ok(connection) => {
                self.session = Some(Session::new(&self.options.username, connection.handle));
                self.world_events = Some(connection.events);
            }
            Err(e) => self.handle(e.into()),
        }
    }

    /// Wait for and process one input. Returns false on shutdown.
    pub async fn step(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return false;
        }

        let step = tokio::select! {
            biased;
            changed = shutdown.changed() => Step::Signal { sender_alive: changed.is_ok() },
            event = next_world_event(&mut self.world_events) => Step::World(event),
            Some(message) = self.internal_rx.recv() => Step::Internal(message),
            _ = wait_until(self.reconnect_at) => Step::Reconnect,
        };

        match step {
            Step::Signal { sender_alive } => {
                if !sender_alive || *shutdown.borrow() {
                    return false;
                }
            }
            Step::World(Some(event)) => self.handle(event.into()),
            Step::World(None) => {
                // Stream closed without a terminal event
                self.world_events = None;
                self.handle(SessionEvent::End);
            }
            Step::Internal(Internal::RespawnSettled(id)) => {
                if self.session.as_ref().is_some_and(|s| s.id() == id) {
                    self.handle(SessionEvent::RespawnSettled);
                }
            }
            Step::Reconnect => {
                self.reconnect_at = None;
                self.start().await;
            }
        }
        true
    }

    /// Release everything for process exit
    pub fn stop(&mut self) {
        self.reconnect_at = None;
        self.world_events = None;
        if let Some(session) = self.session.take() {
            session.close();
            self.log(LogLevel::Info, "Bot", "Connection closed for shutdown");
        }
    }

    fn handle(&mut self, event: SessionEvent) {
        for effect in self.machine.apply(&event) {
            self.execute(effect, &event);
        }
    }

    fn execute(&mut self, effect: Effect, event: &SessionEvent) {
        let session = self.session.clone();

        match effect {
            // Performed by `start`
            Effect::Connect => {}

            Effect::ResetReconnect => self.reconnect.reset(),

            Effect::AnnounceConnected => {
                let username = session
                    .map(|s| s.handle().username())
                    .unwrap_or_else(|| self.options.username.clone());
                self.log(LogLevel::Info, "Bot", format!("Logged in as {}", username));
                self.sink.status_changed(StatusUpdate::connected(username));
            }

            Effect::CaptureSpawnPoint => {
                let Some(session) = session else { return };
                self.log(LogLevel::Info, "Bot", "Bot spawned successfully");
                match session.handle().position() {
                    Some(position) => {
                        session.set_spawn_point(position);
                        self.log(LogLevel::Info, "Bot", format!("Spawn point set: {}", position));
                    }
                    None => self.log(LogLevel::Warn, "Bot", "Spawned without a known position"),
                }
            }

            Effect::ConfigureNavigation => {
                if let Some(session) = session {
                    session
                        .handle()
                        .navigator()
                        .set_movement_policy(MovementPolicy::default());
                }
            }

            Effect::ScheduleRespawnCapture => {
                let Some(session) = session else { return };
                self.log(LogLevel::Info, "Bot", "Bot died, will respawn");

                let tx = self.internal_tx.clone();
                let id = session.id();
                tokio::spawn(async move {
                    tokio::time::sleep(RESPAWN_SETTLE_DELAY).await;
                    let _ = tx.send(Internal::RespawnSettled(id));
                });
            }

            Effect::RecaptureSpawnPoint => {
                let Some(session) = session else { return };
                if let Some(position) = session.handle().position() {
                    session.set_spawn_point(position);
                    self.log(LogLevel::Info, "Bot", "Spawn point updated after respawn");
                }
            }

            Effect::RunScheduler => {
                if let Some(session) = session {
                    self.on_tick(&session);
                }
            }

            Effect::Teardown => {
                match event {
                    SessionEvent::Error(reason) => {
                        self.log(LogLevel::Error, "Error", format!("Bot error: {}", reason))
                    }
                    SessionEvent::Kicked(reason) => {
                        self.log(LogLevel::Warn, "Bot", format!("Kicked from server: {}", reason))
                    }
                    _ => self.log(LogLevel::Info, "Bot", "Connection ended"),
                }
                self.world_events = None;
                if let Some(session) = self.session.take() {
                    session.close();
                }
            }

            Effect::ScheduleReconnect => {
                let delay = self.reconnect.record_failure(&self.policy);
                self.reconnect_at = Some(Instant::now() + delay);
                self.log(
                    LogLevel::Info,
                    "Bot",
                    format!(
                        "Reconnecting in {}s (attempt {})",
                        delay.as_secs_f64(),
                        self.reconnect.attempts()
                    ),
                );
            }

            Effect::AnnounceDisconnected => {
                self.sink
                    .status_changed(StatusUpdate::disconnected(self.reconnect.attempts()));
            }
        }
    }

    fn on_tick(&mut self, session: &Arc<Session>) {
        if session.spawn_point().is_none() {
            return;
        }

        let now = Instant::now();
        match self.scheduler.poll(now, &mut self.rng, session.is_moving()) {
            Decision::Wait => {}
            Decision::Suppressed(behavior) => {
                debug!("Skipping {}: already moving", behavior.as_str());
            }
            Decision::Dispatch(behavior) => self.dispatch(behavior, session, now),
        }
    }

    fn dispatch(&mut self, behavior: Behavior, session: &Arc<Session>, now: Instant) {
        match behavior {
            Behavior::Locomotion => {
                let plan = WanderPlan::draw(&mut self.rng, self.config.movement_radius);
                if behaviors::start_wander(session, plan, Arc::clone(&self.sink)).is_none() {
                    debug!("Locomotion skipped: walk already in flight");
                }
            }
            Behavior::Jump => {
                let duration = behaviors::jump(session, &mut self.rng);
                self.log(
                    LogLevel::Info,
                    "Action",
                    format!("Jumped for {}ms", duration.as_millis()),
                );
            }
            Behavior::Crouch => {
                let duration = behaviors::crouch(session, &mut self.rng);
                self.log(
                    LogLevel::Info,
                    "Action",
                    format!("Sneaking for {}ms", duration.as_millis()),
                );
            }
            Behavior::Vocalize => {
                let said = behaviors::vocalize(
                    session,
                    self.scheduler.timing_mut(),
                    now,
                    self.config.chat_probability,
                    &mut self.rng,
                );
                if let Some(message) = said {
                    self.log(LogLevel::Info, "Action", format!("Sent chat: \"{}\"", message));
                }
            }
        }
    }

    fn log(&self, level: LogLevel, module: &str, message: impl Into<String>) {
        emit(self.sink.as_ref(), level, module, message);
    }
}

async fn next_world_event(
    events: &mut Option<mpsc::UnboundedReceiver<WorldEvent>>,
) -> Option<WorldEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Convert a connect failure into the reason string the state machine logs
impl From<WorldError> for SessionEvent {
    fn from(error: WorldError) -> Self {
        SessionEvent::Error(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::Hub;
    use crate::world::{OfflineWorld, OfflineWorldConfig, Vec3};

    fn quiet_world() -> Arc<OfflineWorld> {
        Arc::new(OfflineWorld::new(OfflineWorldConfig {
            tick_interval: None,
            ..Default::default()
        }))
    }

    fn agent(world: &Arc<OfflineWorld>, hub: &Arc<Hub>) -> Agent {
        Agent::new(Config::default(), world.clone(), hub.clone()).with_seed(7)
    }

    /// Start and process login + spawn
    async fn active_agent(world: &Arc<OfflineWorld>, hub: &Arc<Hub>) -> (Agent, watch::Sender<bool>, watch::Receiver<bool>) {
        let (tx, mut rx) = watch::channel(false);
        let mut agent = agent(world, hub);
        agent.start().await;
        assert!(agent.step(&mut rx).await);
        assert!(agent.step(&mut rx).await);
        assert_eq!(agent.state(), State::Active);
        (agent, tx, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_and_spawn() {
        let world = quiet_world();
        let hub = Hub::with_defaults();
        let (tx, mut rx) = watch::channel(false);
        let mut agent = agent(&world, &hub);

        agent.start().await;
        assert_eq!(agent.state(), State::Connecting);
        assert!(agent.session().is_some());

        agent.step(&mut rx).await;
        assert_eq!(agent.state(), State::Authenticated);
        let status = hub.snapshot().status;
        assert!(status.connected);
        assert_eq!(status.username.as_deref(), Some("Wanderer"));

        agent.step(&mut rx).await;
        assert_eq!(agent.state(), State::Active);
        let session = agent.session().unwrap();
        assert_eq!(session.spawn_point(), Some(Vec3::new(0.5, 65.0, 0.5)));
        assert_eq!(
            world.handle().unwrap().movement_policy(),
            Some(MovementPolicy::default())
        );
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_active_is_noop() {
        let world = quiet_world();
        let hub = Hub::with_defaults();
        let (mut agent, _tx, _rx) = active_agent(&world, &hub).await;
        let before = agent.session().unwrap().id();

        agent.start().await;
        agent.start().await;

        assert_eq!(world.connect_count(), 1);
        assert_eq!(agent.state(), State::Active);
        assert_eq!(agent.session().unwrap().id(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_tears_down_and_schedules_one_reconnect() {
        let world = quiet_world();
        let hub = Hub::with_defaults();
        let (mut agent, _tx, mut rx) = active_agent(&world, &hub).await;
        let session = agent.session().unwrap();

        world.emit(WorldEvent::Kicked("Flying is not enabled".into()));
        agent.step(&mut rx).await;

        assert_eq!(agent.state(), State::Terminated);
        assert!(agent.session().is_none());
        assert!(!session.is_live());
        assert!(session.spawn_point().is_none());
        assert!(world.handle().unwrap().is_quit());
        assert_eq!(agent.reconnect_attempts(), 1);
        assert_eq!(agent.reconnect_in(), Some(Duration::from_millis(5000)));

        let status = hub.snapshot().status;
        assert!(!status.connected);
        assert!(status.reconnecting);

        // Timer fires, new session logs in and resets the counter
        let fired = Instant::now();
        agent.step(&mut rx).await;
        assert!(Instant::now() - fired >= Duration::from_millis(5000));
        assert_eq!(agent.state(), State::Connecting);
        assert_eq!(world.connect_count(), 2);
        assert!(agent.reconnect_in().is_none());

        agent.step(&mut rx).await;
        assert_eq!(agent.state(), State::Authenticated);
        assert_eq!(agent.reconnect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_while_connect_fails() {
        let world = quiet_world();
        let hub = Hub::with_defaults();
        let (_tx, mut rx) = watch::channel(false);
        let mut agent = agent(&world, &hub);
        world.refuse_connections(3);

        agent.start().await;
        assert_eq!(agent.state(), State::Terminated);
        assert_eq!(agent.reconnect_in(), Some(Duration::from_millis(5000)));

        agent.step(&mut rx).await;
        assert_eq!(agent.reconnect_attempts(), 2);
        assert_eq!(agent.reconnect_in(), Some(Duration::from_millis(10000)));

        agent.step(&mut rx).await;
        assert_eq!(agent.reconnect_attempts(), 3);
        assert_eq!(agent.reconnect_in(), Some(Duration::from_millis(15000)));

        agent.step(&mut rx).await;
        assert_eq!(agent.state(), State::Connecting);
        assert_eq!(world.connect_count(), 1);

        let logs = hub.recent_logs(50);
        assert!(logs.iter().any(|l| l.message == "Reconnecting in 15s (attempt 3)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_death_recaptures_spawn_after_settle() {
        let world = quiet_world();
        let hub = Hub::with_defaults();
        let (mut agent, _tx, mut rx) = active_agent(&world, &hub).await;
        let session = agent.session().unwrap();
        let respawn = Vec3::new(120.5, 70.0, -33.5);

        world.kill(respawn);
        agent.step(&mut rx).await;
        assert_eq!(agent.state(), State::Active);
        assert_eq!(session.spawn_point(), Some(Vec3::new(0.5, 65.0, 0.5)));

        let died = Instant::now();
        agent.step(&mut rx).await;
        assert!(Instant::now() - died >= RESPAWN_SETTLE_DELAY);
        assert_eq!(session.spawn_point(), Some(respawn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_for_old_session_is_ignored() {
        let world = quiet_world();
        let hub = Hub::with_defaults();
        let (mut agent, _tx, mut rx) = active_agent(&world, &hub).await;

        world.kill(Vec3::new(50.0, 65.0, 50.0));
        agent.step(&mut rx).await;
        world.emit(WorldEvent::End);
        agent.step(&mut rx).await;
        assert_eq!(agent.state(), State::Terminated);

        // Settle message (3s) arrives before the reconnect timer (5s)
        agent.step(&mut rx).await;
        assert_eq!(agent.state(), State::Terminated);
        assert_eq!(agent.reconnect_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_dispatch_behaviors() {
        let world = Arc::new(OfflineWorld::with_defaults());
        let hub = Hub::with_defaults();
        let (mut agent, _tx, mut rx) = active_agent(&world, &hub).await;

        // 50ms ticks, roughly two minutes
        let mut instants: Vec<Instant> = Vec::new();
        for _ in 0..2400 {
            agent.step(&mut rx).await;
            let last = agent.scheduler().timing().last_action();
            if let Some(at) = last.filter(|at| instants.last() != Some(at)) {
                instants.push(at);
            }
        }

        let min = Config::default().action_interval_min;
        let max = Config::default().action_interval_max + Duration::from_millis(50);
        assert!(instants.len() >= 2);
        for pair in instants.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= min, "actions {:?} apart", gap);
            assert!(gap <= max, "actions {:?} apart", gap);
        }
        let actions = hub
            .recent_logs(500)
            .into_iter()
            .filter(|l| l.module == "Action")
            .count();
        assert!(actions >= 1);
        assert_eq!(agent.state(), State::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let world = quiet_world();
        let hub = Hub::with_defaults();
        let (mut agent, tx, mut rx) = active_agent(&world, &hub).await;

        tx.send(true).unwrap();
        assert!(!agent.step(&mut rx).await);
        agent.stop();

        assert!(agent.session().is_none());
        assert!(world.handle().unwrap().is_quit());
    }
}
