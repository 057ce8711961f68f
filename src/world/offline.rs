//! Offline World
//!
//! In-process stand-in for a protocol client. Flat terrain, a fixed-rate
//! physics clock and straight-line navigation. Used by the binary when no
//! real client is linked and by the tests as a scriptable fake.
//!
//! Scripting hooks (`emit`, `kill`, `set_block`, `refuse_connections`, ...)
//! act on the most recently connected handle.

use super::traits::{ConnectOptions, Connection, Navigator, WorldConnector, WorldError, WorldHandle};
use super::{BlockInfo, Control, GoalNear, MovementPolicy, Vec3, WorldEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Offline world configuration
#[derive(Debug, Clone)]
pub struct OfflineWorldConfig {
    /// Where new connections spawn
    pub spawn: Vec3,
    /// Highest solid layer of the flat terrain
    pub ground_level: i64,
    /// Physics clock period (None = no automatic ticks)
    pub tick_interval: Option<Duration>,
    /// Delay between connect and the login/spawn events
    pub login_delay: Duration,
    /// Walking speed used to time navigation, in blocks per second
    pub travel_speed: f64,
}

impl Default for OfflineWorldConfig {
    fn default() -> Self {
        Self {
            spawn: Vec3::new(0.5, 65.0, 0.5),
            ground_level: 64,
            tick_interval: Some(Duration::from_millis(50)),
            login_delay: Duration::from_millis(250),
            travel_speed: 4.3,
        }
    }
}

/// Terrain and failure switches shared by every handle of one world
#[derive(Debug, Default)]
struct WorldState {
    blocks: HashMap<(i64, i64, i64), String>,
    fail_navigation: bool,
}

/// Offline world connector
pub struct OfflineWorld {
    config: OfflineWorldConfig,
    state: Arc<Mutex<WorldState>>,
    current: Mutex<Option<Arc<OfflineHandle>>>,
    connects: AtomicU32,
    refusals: AtomicU32,
}

impl OfflineWorld {
    pub fn new(config: OfflineWorldConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(WorldState::default())),
            current: Mutex::new(None),
            connects: AtomicU32::new(0),
            refusals: AtomicU32::new(0),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(OfflineWorldConfig::default())
    }

    /// Number of connect calls accepted so far
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Refuse the next `count` connect calls
    pub fn refuse_connections(&self, count: u32) {
        self.refusals.store(count, Ordering::Relaxed);
    }

    /// Most recently connected handle
    pub fn handle(&self) -> Option<Arc<OfflineHandle>> {
        self.current.lock().clone()
    }

    /// Override a single block
    pub fn set_block(&self, x: i64, y: i64, z: i64, name: &str) {
        self.state.lock().blocks.insert((x, y, z), name.to_string());
    }

    /// Make every navigation attempt fail
    pub fn set_navigation_failure(&self, fail: bool) {
        self.state.lock().fail_navigation = fail;
    }

    /// Push a lifecycle event to the current connection
    pub fn emit(&self, event: WorldEvent) -> bool {
        match self.handle() {
            Some(handle) => handle.emit(event),
            None => false,
        }
    }

    /// Kill the entity and respawn it at `respawn_at`
    pub fn kill(&self, respawn_at: Vec3) -> bool {
        match self.handle() {
            Some(handle) => {
                let sent = handle.emit(WorldEvent::Death);
                handle.teleport(respawn_at);
                sent
            }
            None => false,
        }
    }
}

#[async_trait]
impl WorldConnector for OfflineWorld {
    async fn connect(&self, options: &ConnectOptions) -> Result<Connection, WorldError> {
        let refused = self
            .refusals
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(WorldError::ConnectionFailed(format!(
                "connect ECONNREFUSED {}",
                options.endpoint()
            )));
        }

        self.connects.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Arc::new(OfflineHandle {
            username: options.username.clone(),
            position: Mutex::new(None),
            controls: Mutex::new(HashMap::new()),
            chat_log: Mutex::new(Vec::new()),
            looks: Mutex::new(Vec::new()),
            policy: Mutex::new(None),
            quit: AtomicBool::new(false),
            events: tx,
            world: Arc::clone(&self.state),
            ground_level: self.config.ground_level,
            travel_speed: self.config.travel_speed,
        });

        *self.current.lock() = Some(Arc::clone(&handle));
        info!(
            "Offline world accepted {} on {} (version {})",
            options.username,
            options.endpoint(),
            options.version
        );

        tokio::spawn(drive(
            Arc::clone(&handle),
            self.config.spawn,
            self.config.login_delay,
            self.config.tick_interval,
        ));

        Ok(Connection { handle, events: rx })
    }
}

/// Emits login, spawn and then physics ticks until the handle quits
async fn drive(
    handle: Arc<OfflineHandle>,
    spawn: Vec3,
    login_delay: Duration,
    tick_interval: Option<Duration>,
) {
    tokio::time::sleep(login_delay).await;
    if !handle.emit(WorldEvent::Login) {
        return;
    }

    handle.teleport(spawn);
    if !handle.emit(WorldEvent::Spawn) {
        return;
    }

    let Some(period) = tick_interval else {
        return;
    };

    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if !handle.emit(WorldEvent::PhysicsTick) {
            debug!("Offline clock stopped for {}", handle.username);
            return;
        }
    }
}

/// Connection handle into the offline world
pub struct OfflineHandle {
    username: String,
    position: Mutex<Option<Vec3>>,
    controls: Mutex<HashMap<Control, bool>>,
    chat_log: Mutex<Vec<String>>,
    looks: Mutex<Vec<(f64, f64)>>,
    policy: Mutex<Option<MovementPolicy>>,
    quit: AtomicBool,
    events: mpsc::UnboundedSender<WorldEvent>,
    world: Arc<Mutex<WorldState>>,
    ground_level: i64,
    travel_speed: f64,
}

impl OfflineHandle {
    /// Send an event; false once the connection is closed or nobody listens
    pub fn emit(&self, event: WorldEvent) -> bool {
        !self.is_quit() && self.events.send(event).is_ok()
    }

    pub fn teleport(&self, position: Vec3) {
        *self.position.lock() = Some(position);
    }

    pub fn is_quit(&self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }

    /// Current state of a control (released when never touched)
    pub fn control(&self, control: Control) -> bool {
        self.controls.lock().get(&control).copied().unwrap_or(false)
    }

    pub fn chat_log(&self) -> Vec<String> {
        self.chat_log.lock().clone()
    }

    pub fn looks(&self) -> Vec<(f64, f64)> {
        self.looks.lock().clone()
    }

    pub fn movement_policy(&self) -> Option<MovementPolicy> {
        self.policy.lock().clone()
    }
}

impl WorldHandle for OfflineHandle {
    fn username(&self) -> String {
        self.username.clone()
    }

    fn position(&self) -> Option<Vec3> {
        *self.position.lock()
    }

    fn set_control_state(&self, control: Control, state: bool) {
        self.controls.lock().insert(control, state);
    }

    fn chat(&self, text: &str) {
        self.chat_log.lock().push(text.to_string());
    }

    fn look(&self, yaw: f64, pitch: f64, _smooth: bool) {
        self.looks.lock().push((yaw, pitch));
    }

    fn block_at(&self, position: Vec3) -> Option<BlockInfo> {
        let coords = position.block_coords();
        if let Some(name) = self.world.lock().blocks.get(&coords) {
            return Some(BlockInfo::new(name.clone()));
        }

        let name = match coords.1 {
            y if y == self.ground_level => "grass_block",
            y if y < self.ground_level => "stone",
            _ => "air",
        };
        Some(BlockInfo::new(name))
    }

    fn quit(&self) {
        if !self.quit.swap(true, Ordering::Relaxed) {
            debug!("Offline connection for {} closed", self.username);
        }
    }

    fn navigator(&self) -> &dyn Navigator {
        self
    }
}

#[async_trait]
impl Navigator for OfflineHandle {
    fn set_movement_policy(&self, policy: MovementPolicy) {
        *self.policy.lock() = Some(policy);
    }

    async fn goto(&self, goal: GoalNear) -> Result<(), WorldError> {
        if self.is_quit() {
            return Err(WorldError::NotConnected);
        }

        let start = self.position().ok_or(WorldError::NotConnected)?;

        if self.world.lock().fail_navigation {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Err(WorldError::NavigationFailed("No path to the goal!".to_string()));
        }

        let distance = (start.distance_to(goal.target) - goal.range).max(0.0);
        let travel = Duration::from_secs_f64(distance / self.travel_speed.max(0.1));
        tokio::time::sleep(travel).await;

        if self.is_quit() {
            return Err(WorldError::NotConnected);
        }

        self.teleport(goal.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConnectOptions {
        ConnectOptions {
            host: "localhost".to_string(),
            port: 25565,
            username: "Wanderer".to_string(),
            password: None,
            version: "1.20.1".to_string(),
        }
    }

    fn quiet_world() -> OfflineWorld {
        OfflineWorld::new(OfflineWorldConfig {
            tick_interval: None,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_emits_login_then_spawn() {
        let world = quiet_world();
        let mut conn = world.connect(&options()).await.unwrap();

        assert_eq!(conn.events.recv().await, Some(WorldEvent::Login));
        assert_eq!(conn.events.recv().await, Some(WorldEvent::Spawn));
        assert_eq!(conn.handle.position(), Some(Vec3::new(0.5, 65.0, 0.5)));
        assert_eq!(conn.handle.username(), "Wanderer");
        assert_eq!(world.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connections() {
        let world = quiet_world();
        world.refuse_connections(2);

        assert!(world.connect(&options()).await.is_err());
        assert!(world.connect(&options()).await.is_err());
        assert!(world.connect(&options()).await.is_ok());
        assert_eq!(world.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_stop_after_quit() {
        let world = OfflineWorld::new(OfflineWorldConfig {
            tick_interval: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let mut conn = world.connect(&options()).await.unwrap();

        assert_eq!(conn.events.recv().await, Some(WorldEvent::Login));
        assert_eq!(conn.events.recv().await, Some(WorldEvent::Spawn));
        assert_eq!(conn.events.recv().await, Some(WorldEvent::PhysicsTick));

        conn.handle.quit();
        // Clock stops at the first tick after quit
        tokio::time::sleep(Duration::from_millis(200)).await;
        while let Ok(event) = conn.events.try_recv() {
            assert_eq!(event, WorldEvent::PhysicsTick);
        }
        assert!(!world.emit(WorldEvent::End));
    }

    #[tokio::test]
    async fn test_flat_terrain() {
        let world = quiet_world();
        let conn = world.connect(&options()).await.unwrap();

        let ground = conn.handle.block_at(Vec3::new(3.2, 64.5, -7.0)).unwrap();
        assert_eq!(ground.name, "grass_block");
        let above = conn.handle.block_at(Vec3::new(3.2, 65.0, -7.0)).unwrap();
        assert_eq!(above.name, "air");

        world.set_block(3, 65, -7, "water");
        let wet = conn.handle.block_at(Vec3::new(3.2, 65.0, -7.0)).unwrap();
        assert!(!wet.is_solid());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_moves_entity() {
        let world = quiet_world();
        let conn = world.connect(&options()).await.unwrap();
        conn.handle.set_control_state(Control::Jump, true);
        assert!(world.handle().unwrap().control(Control::Jump));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let goal = GoalNear::new(Vec3::new(10.0, 65.0, 0.0), 1.0);
        conn.handle.navigator().goto(goal).await.unwrap();
        assert_eq!(conn.handle.position(), Some(goal.target));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_switch() {
        let world = quiet_world();
        let conn = world.connect(&options()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        world.set_navigation_failure(true);
        let goal = GoalNear::new(Vec3::new(10.0, 65.0, 0.0), 1.0);
        let result = conn.handle.navigator().goto(goal).await;
        assert!(matches!(result, Err(WorldError::NavigationFailed(_))));
    }
}
