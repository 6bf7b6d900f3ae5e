//! Bounded retry wrapper for fallible async operations.

use super::Backoff;
use crate::config::domain::RetrySettings;
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Classifies failures as worth retrying.
///
/// Transient network and rate-limit signals are retryable; authorization and
/// validation failures are not and never consume retry attempts.
pub trait Retryable {
    /// Returns whether another attempt may succeed.
    fn is_retryable(&self) -> bool;
}

/// Terminal outcome of a retried operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("operation failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Error from the final attempt.
        last: E,
    },

    /// An attempt failed with a non-retryable error.
    #[error("operation failed with non-retryable error: {0}")]
    Rejected(E),
}

impl<E> RetryError<E> {
    /// Returns the underlying error.
    #[must_use]
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Rejected(err) => err,
        }
    }

    /// Returns the underlying error by reference.
    #[must_use]
    pub const fn inner(&self) -> &E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Rejected(err) => err,
        }
    }
}

/// Retry policy: max attempts plus an exponential, jittered backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Creates a policy making at most `max_attempts` attempts.
    #[must_use]
    pub const fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Builds a policy from settings.
    #[must_use]
    pub const fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(settings.max_attempts, Backoff::from_retry_settings(settings))
    }

    /// Returns a copy of this policy with a different attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff schedule.
    #[must_use]
    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Runs `operation` until it succeeds, fails non-retryably, or the
    /// attempt budget is spent.
    ///
    /// `operation` receives the 1-based attempt number. `seed` identifies the
    /// caller for jitter and logging.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Rejected`] on the first non-retryable failure and
    /// [`RetryError::Exhausted`] when every attempt failed.
    pub async fn execute<T, E, F, Fut>(&self, seed: &str, mut operation: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(RetryError::Rejected(err)),
                Err(err) if attempt >= max_attempts => {
                    tracing::warn!(seed, attempts = attempt, error = %err, "retries exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    let delay = self.backoff.delay(attempt, seed);
                    tracing::debug!(
                        seed,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}
