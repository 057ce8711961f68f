//! Action Scheduler
//!
//! Decides on every physics tick whether the agent should act:
//! - Randomized interval gate (fresh draw per check from `[min, max]`)
//! - Weighted behavior choice from a single uniform sample
//! - Locomotion suppressed while a previous walk is still in flight
//!
//! The scheduler is the only writer of `ActionTiming`.

use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// One of the independent idle behaviors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    Locomotion,
    Jump,
    Crouch,
    Vocalize,
}

impl Behavior {
    /// Cumulative upper bounds over [0, 1), checked in order
    pub const THRESHOLDS: [(f64, Behavior); 4] = [
        (0.5, Behavior::Locomotion),
        (0.7, Behavior::Jump),
        (0.85, Behavior::Crouch),
        (1.0, Behavior::Vocalize),
    ];

    /// First threshold strictly greater than the sample wins
    pub fn from_sample(sample: f64) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(bound, _)| sample < *bound)
            .map(|(_, behavior)| *behavior)
            .unwrap_or(Behavior::Vocalize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locomotion => "locomotion",
            Self::Jump => "jump",
            Self::Crouch => "crouch",
            Self::Vocalize => "vocalize",
        }
    }
}

/// Last dispatch and last vocalization instants
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionTiming {
    last_action: Option<Instant>,
    last_vocalize: Option<Instant>,
}

impl ActionTiming {
    pub fn last_action(&self) -> Option<Instant> {
        self.last_action
    }

    pub fn last_vocalize(&self) -> Option<Instant> {
        self.last_vocalize
    }

    /// Time since the last vocalization, `None` if there never was one
    pub fn since_vocalize(&self, now: Instant) -> Option<Duration> {
        self.last_vocalize.map(|t| now.saturating_duration_since(t))
    }

    pub fn record_vocalize(&mut self, now: Instant) {
        self.last_vocalize = Some(now);
    }
}

/// Outcome of a scheduler check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Interval not yet elapsed
    Wait,
    /// Chosen but skipped; the interval still restarts
    Suppressed(Behavior),
    /// Run this behavior now
    Dispatch(Behavior),
}

/// Interval-gated weighted scheduler
#[derive(Debug, Clone)]
pub struct ActionScheduler {
    min_interval: Duration,
    max_interval: Duration,
    timing: ActionTiming,
}

impl ActionScheduler {
    /// Bounds are swapped if given in the wrong order
    pub fn new(min_interval: Duration, max_interval: Duration) -> Self {
        let (min_interval, max_interval) = if min_interval <= max_interval {
            (min_interval, max_interval)
        } else {
            (max_interval, min_interval)
        };
        Self {
            min_interval,
            max_interval,
            timing: ActionTiming::default(),
        }
    }

    pub fn timing(&self) -> &ActionTiming {
        &self.timing
    }

    pub fn timing_mut(&mut self) -> &mut ActionTiming {
        &mut self.timing
    }

    /// Uniform whole-millisecond delay within the configured bounds
    pub fn next_action_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let min = self.min_interval.as_millis() as u64;
        let max = self.max_interval.as_millis() as u64;
        Duration::from_millis(rng.gen_range(min..=max))
    }

    /// Gate, draw and suppression check for one tick.
    ///
    /// `moving` is the session's locomotion flag; it only blocks another
    /// locomotion, never the other behaviors.
    pub fn poll<R: Rng>(&mut self, now: Instant, rng: &mut R, moving: bool) -> Decision {
        if let Some(last) = self.timing.last_action {
            let target = self.next_action_delay(rng);
            if now.saturating_duration_since(last) < target {
                return Decision::Wait;
            }
        }

        self.timing.last_action = Some(now);

        match Behavior::from_sample(rng.gen::<f64>()) {
            Behavior::Locomotion if moving => Decision::Suppressed(Behavior::Locomotion),
            behavior => Decision::Dispatch(behavior),
        }
    }
}
