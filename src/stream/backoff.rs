//! Reconnect backoff with jitter

use crate::config::ReconnectConfig;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with a capped base and uniform additive jitter.
///
/// The delay before retry `n` (zero-based) is
/// `min(initial * multiplier^n, max_delay) + uniform(0, jitter)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Automatic retries before giving up
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    /// Cap on the exponential part; jitter is added on top
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}

impl ReconnectPolicy {
    /// Whether another automatic retry is allowed after `attempts` retries
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Capped exponential part of the delay for retry `attempt`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let cap = self.max_delay.as_secs_f64();
        let secs = (self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent))
            .min(cap)
            .max(0.0);
        Duration::from_secs_f64(secs)
    }

    /// Delay for retry `attempt` with `fraction` of the jitter range applied
    pub fn delay_with_jitter(&self, attempt: u32, fraction: f64) -> Duration {
        self.base_delay(attempt) + self.jitter.mul_f64(fraction.clamp(0.0, 1.0))
    }

    /// Delay for retry `attempt` with random jitter
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let fraction: f64 = rand::rng().random();
        self.delay_with_jitter(attempt, fraction)
    }
}
