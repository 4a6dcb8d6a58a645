//! Exponential backoff with jitter for reconnect scheduling
//!
//! Pure delay policy, separated from the connection loop so the bounds are
//! testable with an injected RNG.

use crate::infrastructure::config::ClientConfig;
use rand::Rng;
use std::time::Duration;

/// Bounded exponential backoff: `min(base * 2^attempt, cap)` plus a random
/// jitter in `[0, jitter_max]`, giving up after `max_attempts`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    jitter_max: Duration,
    max_attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, jitter_max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            jitter_max,
            max_attempts,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_cap_ms),
            Duration::from_millis(config.backoff_jitter_ms),
            config.max_attempts,
        )
    }

    /// Delay before reconnect attempt `attempt` (0-indexed), or `None` once
    /// the attempt budget is exhausted.
    pub fn delay_for(&self, attempt: u32, rng: &mut impl Rng) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.min(31)));
        let capped = exp.min(self.cap);

        let jitter_ms = self.jitter_max.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.gen_range(0..=jitter_ms))
        };

        Some(capped + jitter)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
