//! Reconnect strategies: how long to wait before each reconnect attempt.
//!
//! `Periodic` reconnects at a fixed interval; `ExponentialBackoff` doubles (or scales by any
//! chosen factor) the delay up to a cap, optionally randomized so that many clients reconnecting
//! after the same outage don't all hammer the server in lockstep.

use std::time::Duration;

use rand::Rng;

/// Decides the delay before reconnect attempt `attempt` (1-indexed).
pub trait ReconnectStrategy: Send + Sync {
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
}

/// Always waits the same fixed interval.
pub struct Periodic {
    pub interval: Duration,
}

impl Periodic {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl ReconnectStrategy for Periodic {
    fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.interval
    }
}

/// `min(max, initial * factor^(attempt-1))`, optionally randomized by ±50% when `jitter` is
/// enabled. With `jitter` disabled, `delay_for_attempt` is exactly that formula.
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub factor: f64,
    pub jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self { initial, max, factor, jitter: true }
    }

    /// Builds a strategy with jitter disabled, producing the deterministic
    /// `min(max, initial * factor^(attempt-1))` delay for every attempt.
    pub fn without_jitter(initial: Duration, max: Duration, factor: f64) -> Self {
        Self { initial, max, factor, jitter: false }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self { initial: Duration::from_millis(500), max: Duration::from_secs(30), factor: 2.0, jitter: true }
    }
}

impl ReconnectStrategy for ExponentialBackoff {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.initial.as_secs_f64() * self.factor.powi(exponent);
        let capped = raw.min(self.max.as_secs_f64());
        if !self.jitter {
            return Duration::from_secs_f64(capped);
        }
        let jitter = rand::thread_rng().gen_range(0.5..=1.5);
        Duration::from_secs_f64((capped * jitter).max(0.0))
    }
}
