//! Token-bucket rate limiting scoped per (owner, service).

use crate::agent::domain::AgentKey;
use crate::config::domain::{BucketSettings, RateLimitSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Behaviour when a call finds its bucket empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait until the next refill makes a token available.
    #[default]
    BlockUntilAvailable,
    /// Reject the call immediately.
    FailFast,
}

/// Error returned when a fail-fast bucket is empty.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("rate limit exceeded for {key}; next token in {retry_after:?}")]
pub struct RateLimitExceeded {
    /// Throttled key.
    pub key: AgentKey,
    /// Time until the next refill.
    pub retry_after: Duration,
}

/// How a permitted call obtained its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A token was available.
    Immediate,
    /// The caller waited for a refill.
    Delayed(Duration),
}

#[derive(Debug)]
struct TokenBucket {
    settings: BucketSettings,
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    const fn new(settings: BucketSettings, now: Instant) -> Self {
        Self {
            settings,
            tokens: settings.capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let interval = self.settings.refill_interval();
        let elapsed = now.saturating_duration_since(self.last_refill);
        let elapsed_intervals = elapsed
            .as_nanos()
            .checked_div(interval.as_nanos())
            .unwrap_or(0);
        if elapsed_intervals == 0 {
            return;
        }
        let intervals = u32::try_from(elapsed_intervals).unwrap_or(u32::MAX);
        let added = self.settings.refill_amount.saturating_mul(intervals);
        self.tokens = self.tokens.saturating_add(added).min(self.settings.capacity);
        self.last_refill = interval
            .checked_mul(intervals)
            .and_then(|advance| self.last_refill.checked_add(advance))
            .unwrap_or(now);
    }

    /// Takes a token, or returns the time until the next refill.
    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            return Ok(());
        }
        let next_refill = self.last_refill + self.settings.refill_interval();
        Err(next_refill.saturating_duration_since(now))
    }
}

/// Shared rate limiter holding one token bucket per (owner, service).
///
/// One owner's burst drains only that owner's bucket for the service.
#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    buckets: Mutex<HashMap<AgentKey, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    /// Creates a limiter with per-service bucket settings.
    #[must_use]
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            buckets: Mutex::default(),
        }
    }

    /// Returns the configured overflow policy.
    #[must_use]
    pub const fn overflow_policy(&self) -> OverflowPolicy {
        self.settings.overflow
    }

    async fn bucket(&self, key: &AgentKey) -> Arc<Mutex<TokenBucket>> {
        let mut buckets = self.buckets.lock().await;
        let settings = *self.settings.bucket_for(key.service().as_str());
        Arc::clone(
            buckets
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(settings, Instant::now())))),
        )
    }

    /// Takes a token for `key`, waiting or failing per the overflow policy.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] when the bucket is empty and the policy
    /// is [`OverflowPolicy::FailFast`].
    pub async fn acquire(&self, key: &AgentKey) -> Result<Admission, RateLimitExceeded> {
        let bucket = self.bucket(key).await;
        let started = Instant::now();
        let mut waited = false;
        loop {
            let outcome = bucket.lock().await.try_take(Instant::now());
            match (outcome, self.settings.overflow) {
                (Ok(()), _) if !waited => return Ok(Admission::Immediate),
                (Ok(()), _) => return Ok(Admission::Delayed(started.elapsed())),
                (Err(retry_after), OverflowPolicy::FailFast) => {
                    tracing::debug!(%key, ?retry_after, "rate limit exceeded");
                    return Err(RateLimitExceeded {
                        key: key.clone(),
                        retry_after,
                    });
                }
                (Err(retry_after), OverflowPolicy::BlockUntilAvailable) => {
                    tracing::debug!(%key, ?retry_after, "rate limit reached, waiting for refill");
                    tokio::time::sleep(retry_after).await;
                    waited = true;
                }
            }
        }
    }
}
