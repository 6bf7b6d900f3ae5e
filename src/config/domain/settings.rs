//! Process-wide runtime settings.
//!
//! Settings are loaded once at startup from a JSON document. Every section
//! and field is optional; omitted values fall back to documented defaults,
//! and unknown keys are rejected.

use crate::resilience::OverflowPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while parsing or validating runtime settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid settings JSON.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value parsed but is out of range.
    #[error("invalid setting '{field}': {reason}")]
    Invalid {
        /// Dotted setting path.
        field: &'static str,
        /// Human-readable reason.
        reason: &'static str,
    },
}

/// Root settings document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    /// Supervisor timing and restart policy.
    pub supervisor: SupervisorSettings,
    /// Retry policy for outbound calls.
    pub retry: RetrySettings,
    /// Token-bucket rate limits.
    pub rate_limit: RateLimitSettings,
    /// Operating-cycle behaviour.
    pub cycle: CycleSettings,
    /// Event bus delivery.
    pub event_bus: EventBusSettings,
}

impl RuntimeSettings {
    /// Parses and validates a settings document.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] for malformed JSON or unknown keys and
    /// [`SettingsError::Invalid`] for out-of-range values.
    pub fn from_json_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let checks = [
            (self.retry.max_attempts == 0, "retry.max_attempts", "must be at least 1"),
            (self.retry.multiplier < 2, "retry.multiplier", "must be at least 2"),
            (self.retry.jitter_percent > 100, "retry.jitter_percent", "must not exceed 100"),
            (
                self.supervisor.wedge_multiplier == 0,
                "supervisor.wedge_multiplier",
                "must be at least 1",
            ),
            (
                self.supervisor.restart.multiplier < 2,
                "supervisor.restart.multiplier",
                "must be at least 2",
            ),
            (
                self.supervisor.init_max_attempts == 0,
                "supervisor.init_max_attempts",
                "must be at least 1",
            ),
            (
                self.supervisor.health_check_interval_ms == 0,
                "supervisor.health_check_interval_ms",
                "must be positive",
            ),
            (
                self.cycle.engine_max_attempts == 0,
                "cycle.engine_max_attempts",
                "must be at least 1",
            ),
            (
                self.rate_limit.default_bucket.is_invalid()
                    || self
                        .rate_limit
                        .services
                        .values()
                        .any(BucketSettings::is_invalid),
                "rate_limit",
                "bucket capacity, refill amount, and refill interval must be positive",
            ),
        ];
        match checks.into_iter().find(|(failed, _, _)| *failed) {
            Some((_, field, reason)) => Err(SettingsError::Invalid { field, reason }),
            None => Ok(()),
        }
    }
}

/// Supervisor timing and restart policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorSettings {
    /// Interval between health passes.
    pub health_check_interval_ms: u64,
    /// An instance is wedged after this many intervals without progress.
    pub wedge_multiplier: u32,
    /// Upper bound on initialize and stop hooks.
    pub hook_timeout_ms: u64,
    /// Time a stopping loop gets before it is aborted.
    pub stop_grace_ms: u64,
    /// Initialize attempts before the instance is marked failed.
    pub init_max_attempts: u32,
    /// Restart policy applied after failures.
    pub restart: RestartSettings,
}

impl SupervisorSettings {
    /// Returns the health-pass interval.
    #[must_use]
    pub const fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Returns the hook timeout.
    #[must_use]
    pub const fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }

    /// Returns the stop grace period.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            health_check_interval_ms: 10_000,
            wedge_multiplier: 3,
            hook_timeout_ms: 30_000,
            stop_grace_ms: 10_000,
            init_max_attempts: 3,
            restart: RestartSettings::default(),
        }
    }
}

/// Bounded exponential restart policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestartSettings {
    /// Consecutive failures tolerated before the instance is left failed.
    pub max_restarts: u32,
    /// Delay before the first restart.
    pub base_delay_ms: u64,
    /// Growth factor per restart; at least 2.
    pub multiplier: u32,
    /// Upper bound on restart delay.
    pub max_delay_ms: u64,
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            base_delay_ms: 1_000,
            multiplier: 2,
            max_delay_ms: 60_000,
        }
    }
}

/// Retry policy for outbound calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Growth factor per retry; at least 2.
    pub multiplier: u32,
    /// Upper bound on retry delay.
    pub max_delay_ms: u64,
    /// Maximum jitter as a percentage of the computed delay.
    pub jitter_percent: u8,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            multiplier: 2,
            max_delay_ms: 30_000,
            jitter_percent: 20,
        }
    }
}

/// Token-bucket rate limits keyed per (owner, service).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitSettings {
    /// Bucket used for services without an override.
    pub default_bucket: BucketSettings,
    /// Per-service bucket overrides keyed by service name.
    pub services: BTreeMap<String, BucketSettings>,
    /// Behaviour when a bucket is empty.
    pub overflow: OverflowPolicy,
}

impl RateLimitSettings {
    /// Returns the bucket for `service`.
    #[must_use]
    pub fn bucket_for(&self, service: &str) -> &BucketSettings {
        self.services.get(service).unwrap_or(&self.default_bucket)
    }
}

/// Capacity and refill schedule of one token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BucketSettings {
    /// Maximum stored tokens.
    pub capacity: u32,
    /// Tokens added per refill interval.
    pub refill_amount: u32,
    /// Length of one refill interval.
    pub refill_interval_ms: u64,
}

impl BucketSettings {
    /// Returns the refill interval.
    #[must_use]
    pub const fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }

    const fn is_invalid(&self) -> bool {
        self.capacity == 0 || self.refill_amount == 0 || self.refill_interval_ms == 0
    }
}

impl Default for BucketSettings {
    fn default() -> Self {
        Self {
            capacity: 60,
            refill_amount: 60,
            refill_interval_ms: 60_000,
        }
    }
}

/// Operating-cycle behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CycleSettings {
    /// Upper bound on each fetch, engine, and dispatch call.
    pub stage_timeout_ms: u64,
    /// Attempts per engine call before the item is left for the next cycle.
    pub engine_max_attempts: u32,
    /// Cycles an unauthenticated source is tolerated before failing.
    pub auth_grace_cycles: u32,
}

impl CycleSettings {
    /// Returns the stage timeout.
    #[must_use]
    pub const fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            stage_timeout_ms: 30_000,
            engine_max_attempts: 2,
            auth_grace_cycles: 3,
        }
    }
}

/// Event bus delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventBusSettings {
    /// Upper bound on a single handler invocation.
    pub handler_timeout_ms: u64,
    /// Event identities remembered by idempotent consumers.
    pub idempotency_window: usize,
}

impl EventBusSettings {
    /// Returns the handler timeout.
    #[must_use]
    pub const fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}

impl Default for EventBusSettings {
    fn default() -> Self {
        Self {
            handler_timeout_ms: 5_000,
            idempotency_window: 1_024,
        }
    }
}
