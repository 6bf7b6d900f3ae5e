//! Bounded exponential restart policy.

use crate::config::domain::RestartSettings;
use crate::resilience::Backoff;
use std::time::Duration;

/// What to do with an instance that failed or wedged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart after the delay.
    Restart {
        /// Delay before the restart.
        after: Duration,
    },
    /// The ceiling is exceeded; leave the instance failed.
    GiveUp,
}

/// Restart ceiling plus backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    max_restarts: u32,
    backoff: Backoff,
}

impl RestartPolicy {
    /// Creates a policy allowing `max_restarts` restarts.
    #[must_use]
    pub const fn new(max_restarts: u32, backoff: Backoff) -> Self {
        Self {
            max_restarts,
            backoff,
        }
    }

    /// Builds the policy from settings.
    #[must_use]
    pub const fn from_settings(settings: &RestartSettings) -> Self {
        Self::new(settings.max_restarts, Backoff::from_restart_settings(settings))
    }

    /// Returns the restart ceiling.
    #[must_use]
    pub const fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    /// Decides for an instance whose failure count, including the failure
    /// being handled, is `failure_count`.
    #[must_use]
    pub fn decide(&self, failure_count: u32) -> RestartDecision {
        if failure_count > self.max_restarts {
            RestartDecision::GiveUp
        } else {
            RestartDecision::Restart {
                after: self.backoff.base_delay(failure_count.max(1)),
            }
        }
    }
}
