//! Reconnection Policy
//!
//! Linear backoff with a ceiling: `delay = min(base * attempts, max)`.
//! Retries forever; only a successful login resets the attempt counter.

use std::time::Duration;

/// Backoff policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay per consecutive failed attempt
    pub base_delay: Duration,
    /// Ceiling for the computed delay
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(5000),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay before the given (1-based) attempt
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        self.base_delay
            .checked_mul(attempts.max(1))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Consecutive failed attempts since the last successful login
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectState {
    attempts: u32,
}

impl ReconnectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count a termination and return the delay before the next start
    pub fn record_failure(&mut self, policy: &ReconnectPolicy) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        policy.delay_for_attempt(self.attempts)
    }

    /// Successful login
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
