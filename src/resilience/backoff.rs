//! Bounded exponential backoff with deterministic jitter.

use crate::config::domain::{RestartSettings, RetrySettings};
use sha2::{Digest, Sha256};
use std::time::Duration;

const MAX_EXPONENT: u32 = 20;
const PERCENT: u64 = 100;

/// Exponential delay schedule: `base × multiplier^(attempt-1)`, capped at
/// `max`, plus up to `jitter_percent` of the capped delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    multiplier: u32,
    max: Duration,
    jitter_percent: u8,
}

impl Backoff {
    /// Creates a schedule without jitter.
    #[must_use]
    pub const fn new(base: Duration, multiplier: u32, max: Duration) -> Self {
        Self {
            base,
            multiplier,
            max,
            jitter_percent: 0,
        }
    }

    /// Sets the jitter ceiling as a percentage of the computed delay.
    #[must_use]
    pub const fn with_jitter_percent(mut self, jitter_percent: u8) -> Self {
        self.jitter_percent = jitter_percent;
        self
    }

    /// Builds the retry schedule from settings.
    #[must_use]
    pub const fn from_retry_settings(settings: &RetrySettings) -> Self {
        Self::new(
            Duration::from_millis(settings.base_delay_ms),
            settings.multiplier,
            Duration::from_millis(settings.max_delay_ms),
        )
        .with_jitter_percent(settings.jitter_percent)
    }

    /// Builds the restart schedule from settings.
    #[must_use]
    pub const fn from_restart_settings(settings: &RestartSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.base_delay_ms),
            settings.multiplier,
            Duration::from_millis(settings.max_delay_ms),
        )
    }

    /// Returns the delay before retry number `attempt` (1-based), without
    /// jitter.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
        let factor = self.multiplier.saturating_pow(exponent);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Returns the jittered delay before retry number `attempt`.
    ///
    /// Jitter is derived from `seed` and `attempt`, so the same inputs always
    /// produce the same delay while different callers spread out.
    #[must_use]
    pub fn delay(&self, attempt: u32, seed: &str) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_percent == 0 {
            return base;
        }
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let jitter_ceiling = base_ms
            .saturating_mul(u64::from(self.jitter_percent))
            .checked_div(PERCENT)
            .unwrap_or(0);
        let jitter = jitter_seed(seed, attempt)
            .checked_rem(jitter_ceiling.saturating_add(1))
            .unwrap_or(0);
        base.saturating_add(Duration::from_millis(jitter))
    }
}

fn jitter_seed(seed: &str, attempt: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(attempt.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .take(8)
        .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte))
}
