//! Configuration management

use crate::reconnect::ReconnectPolicy;
use crate::world::ConnectOptions;
use anyhow::{bail, Result};
use std::str::FromStr;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// World server host
    pub host: String,

    /// World server port
    pub port: u16,

    /// Account name
    pub username: String,

    /// Account password (optional - offline-mode servers need none)
    pub password: Option<String>,

    /// Protocol version
    pub version: String,

    /// Reconnect delay per consecutive failed attempt
    pub reconnect_delay: Duration,

    /// Ceiling for the reconnect delay
    pub max_reconnect_delay: Duration,

    /// Shortest gap between two idle actions
    pub action_interval_min: Duration,

    /// Longest gap between two idle actions
    pub action_interval_max: Duration,

    /// Chance that a vocalize dispatch actually says something
    pub chat_probability: f64,

    /// How far from spawn the agent wanders, in blocks
    pub movement_radius: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25565,
            username: "Wanderer".to_string(),
            password: None,
            version: "1.20.1".to_string(),
            reconnect_delay: Duration::from_millis(5000),
            max_reconnect_delay: Duration::from_millis(60_000),
            action_interval_min: Duration::from_millis(5000),
            action_interval_max: Duration::from_millis(15_000),
            chat_probability: 0.08,
            movement_radius: 20.0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = std::env::var("MC_HOST").unwrap_or(defaults.host);
        let username = std::env::var("MC_USERNAME").unwrap_or(defaults.username);
        let password = std::env::var("MC_PASSWORD").ok().filter(|p| !p.is_empty());
        let version = std::env::var("MC_VERSION").unwrap_or(defaults.version);

        let config = Self {
            host,
            port: env_or("MC_PORT", defaults.port),
            username,
            password,
            version,
            reconnect_delay: env_millis("RECONNECT_DELAY", defaults.reconnect_delay),
            max_reconnect_delay: env_millis("MAX_RECONNECT_DELAY", defaults.max_reconnect_delay),
            action_interval_min: env_millis("ACTION_INTERVAL_MIN", defaults.action_interval_min),
            action_interval_max: env_millis("ACTION_INTERVAL_MAX", defaults.action_interval_max),
            chat_probability: env_or("CHAT_PROBABILITY", defaults.chat_probability),
            movement_radius: env_or("MOVEMENT_RADIUS", defaults.movement_radius),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("MC_HOST must not be empty");
        }
        if self.username.trim().is_empty() {
            bail!("MC_USERNAME must not be empty");
        }
        if self.action_interval_min > self.action_interval_max {
            bail!(
                "ACTION_INTERVAL_MIN ({}ms) exceeds ACTION_INTERVAL_MAX ({}ms)",
                self.action_interval_min.as_millis(),
                self.action_interval_max.as_millis()
            );
        }
        if !(0.0..=1.0).contains(&self.chat_probability) {
            bail!(
                "CHAT_PROBABILITY must be within [0, 1], got {}",
                self.chat_probability
            );
        }
        if !self.movement_radius.is_finite() || self.movement_radius < 0.0 {
            bail!("MOVEMENT_RADIUS must be a non-negative number");
        }
        if self.reconnect_delay.is_zero() {
            bail!("RECONNECT_DELAY must be positive");
        }
        Ok(())
    }

    /// Connection parameters handed to the world connector
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            version: self.version.clone(),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.reconnect_delay, self.max_reconnect_delay)
    }
}

/// Parse a variable, falling back to `default` when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Millisecond durations
fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
