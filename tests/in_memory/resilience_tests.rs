//! Retry budgets and per-owner rate limiting on outbound calls.

use agentmate::{
    agent::{domain::AgentKey, ports::SourceError},
    config::domain::{BucketSettings, RateLimitSettings},
    resilience::{Admission, Backoff, OverflowPolicy, RateLimiter, RetryError, RetryPolicy},
};
use eyre::{Result, ensure};
use rstest::rstest;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

fn key(owner: &str) -> AgentKey {
    AgentKey::from_parts(owner, "gmail").expect("valid agent key")
}

fn limiter(capacity: u32, refill_interval_ms: u64, overflow: OverflowPolicy) -> RateLimiter {
    RateLimiter::new(RateLimitSettings {
        default_bucket: BucketSettings {
            capacity,
            refill_amount: 1,
            refill_interval_ms,
        },
        overflow,
        ..RateLimitSettings::default()
    })
}

#[tokio::test(start_paused = true)]
async fn transient_failures_use_the_whole_budget_with_growing_delays() -> Result<()> {
    let policy = RetryPolicy::new(
        4,
        Backoff::new(Duration::from_millis(100), 2, Duration::from_secs(10)),
    );
    let attempts_at: Arc<Mutex<Vec<Instant>>> = Arc::default();
    let log = Arc::clone(&attempts_at);

    let outcome: Result<(), RetryError<SourceError>> = policy
        .execute("u1/gmail", |_attempt| {
            let stamps = Arc::clone(&log);
            async move {
                stamps.lock().unwrap_or_else(PoisonError::into_inner).push(Instant::now());
                Err(SourceError::Transient("connection reset".to_owned()))
            }
        })
        .await;

    ensure!(matches!(outcome, Err(RetryError::Exhausted { attempts: 4, .. })));
    let stamps = attempts_at.lock().unwrap_or_else(PoisonError::into_inner).clone();
    ensure!(stamps.len() == 4);
    let gaps: Vec<Duration> = stamps
        .windows(2)
        .filter_map(|pair| match pair {
            [earlier, later] => Some(later.duration_since(*earlier)),
            _ => None,
        })
        .collect();
    ensure!(gaps.windows(2).all(|pair| matches!(pair, [shorter, longer] if shorter < longer)), "gaps {gaps:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fatal_failures_are_not_retried() -> Result<()> {
    let policy = RetryPolicy::new(5, Backoff::new(Duration::from_millis(10), 2, Duration::from_secs(1)));
    let calls = Arc::new(Mutex::new(0_u32));
    let counter = Arc::clone(&calls);

    let outcome: Result<(), RetryError<SourceError>> = policy
        .execute("u1/gmail", |_attempt| {
            let tally = Arc::clone(&counter);
            async move {
                *tally.lock().unwrap_or_else(PoisonError::into_inner) += 1;
                Err(SourceError::fatal(io::Error::other("token revoked")))
            }
        })
        .await;

    ensure!(matches!(outcome, Err(RetryError::Rejected(SourceError::Fatal(_)))));
    ensure!(*calls.lock().unwrap_or_else(PoisonError::into_inner) == 1);
    Ok(())
}

#[rstest]
#[case(1)]
#[case(3)]
#[tokio::test(start_paused = true)]
async fn fail_fast_rejects_exactly_the_overflow(#[case] capacity: u32) -> Result<()> {
    let limits = limiter(capacity, 60_000, OverflowPolicy::FailFast);
    let burst = key("u1");

    let mut rejected = 0;
    for _ in 0..=capacity {
        if limits.acquire(&burst).await.is_err() {
            rejected += 1;
        }
    }

    ensure!(rejected == 1);
    ensure!(limits.acquire(&key("u2")).await? == Admission::Immediate);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn blocking_policy_delays_the_overflow_until_refill() -> Result<()> {
    let limits = limiter(1, 200, OverflowPolicy::BlockUntilAvailable);
    let caller = key("u1");

    ensure!(limits.acquire(&caller).await? == Admission::Immediate);
    let second = limits.acquire(&caller).await?;

    ensure!(
        matches!(second, Admission::Delayed(waited) if waited >= Duration::from_millis(200)),
        "second admission was {second:?}"
    );
    Ok(())
}
