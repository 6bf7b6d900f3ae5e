//! Resilience primitives shared by every outbound call.
//!
//! [`RetryPolicy`] wraps fallible operations with bounded, jittered
//! exponential backoff. [`RateLimiter`] throttles calls per (owner, service)
//! with token buckets.

mod backoff;
mod rate_limit;
mod retry;

pub use backoff::Backoff;
pub use rate_limit::{Admission, OverflowPolicy, RateLimitExceeded, RateLimiter};
pub use retry::{RetryError, RetryPolicy, Retryable};
