//! Process-scoped runtime context.
//!
//! One context is built at startup and handed to every component that
//! publishes events, consults the dedup ledger, or throttles outbound calls.
//! Nothing in the crate reaches for a global instance.

use crate::agent::ports::LiveChannel;
use crate::config::domain::RuntimeSettings;
use crate::dedup::{adapters::InMemoryDedupLedger, ports::DedupLedger};
use crate::event_bus::{
    adapters::InProcessEventBus,
    domain::{Event, Topic},
    ports::EventBus,
};
use crate::resilience::{RateLimiter, RetryPolicy};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;

/// Shared collaborators and settings for one runtime.
pub struct RuntimeContext<C>
where
    C: Clock + Send + Sync,
{
    settings: RuntimeSettings,
    clock: Arc<C>,
    bus: Arc<dyn EventBus>,
    ledger: Arc<dyn DedupLedger>,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
    live_channel: Option<Arc<dyn LiveChannel>>,
}

impl<C> RuntimeContext<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a context from explicit collaborators.
    #[must_use]
    pub fn new(
        settings: RuntimeSettings,
        clock: Arc<C>,
        bus: Arc<dyn EventBus>,
        ledger: Arc<dyn DedupLedger>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(settings.rate_limit.clone());
        let retry = RetryPolicy::from_settings(&settings.retry);
        Self {
            settings,
            clock,
            bus,
            ledger,
            rate_limiter,
            retry,
            live_channel: None,
        }
    }

    /// Creates a context backed by the in-process bus and in-memory ledger.
    #[must_use]
    pub fn in_memory(settings: RuntimeSettings, clock: Arc<C>) -> Self {
        let bus = Arc::new(InProcessEventBus::new(
            settings.event_bus.handler_timeout(),
            Arc::clone(&clock),
        ));
        Self::new(settings, clock, bus, Arc::new(InMemoryDedupLedger::new()))
    }

    /// Attaches a live-update channel.
    #[must_use]
    pub fn with_live_channel(mut self, channel: Arc<dyn LiveChannel>) -> Self {
        self.live_channel = Some(channel);
        self
    }

    /// Returns the runtime settings.
    #[must_use]
    pub const fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Returns the event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    /// Returns the dedup ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn DedupLedger> {
        &self.ledger
    }

    /// Returns the shared rate limiter.
    #[must_use]
    pub const fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Returns the retry policy for outbound source calls.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the live channel, if one is attached.
    #[must_use]
    pub fn live_channel(&self) -> Option<&Arc<dyn LiveChannel>> {
        self.live_channel.as_ref()
    }

    /// Publishes `payload` on `topic`, logging rather than returning any
    /// failure. Returns the event when it reached the bus.
    pub async fn publish<T: Serialize>(&self, topic: Topic, payload: &T, source: &str) -> Option<Event> {
        let event = match Event::from_payload(topic, payload, &*self.clock) {
            Ok(event) => event.with_source(source),
            Err(err) => {
                tracing::warn!(source, error = %err, "cannot encode event payload");
                return None;
            }
        };
        match self.bus.publish(event.clone()).await {
            Ok(_) => Some(event),
            Err(err) => {
                tracing::warn!(topic = %event.topic(), source, error = %err, "event not published");
                None
            }
        }
    }
}
