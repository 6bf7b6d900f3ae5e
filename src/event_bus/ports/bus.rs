//! Event bus port.

use super::EventHandler;
use crate::event_bus::domain::{Event, SubscriptionId, Topic};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Publish/subscribe contract satisfiable in-process or by a remote broker.
///
/// Broker-backed implementations may deliver an event more than once;
/// consumers that cannot tolerate that wrap their handler in
/// [`crate::event_bus::services::IdempotentHandler`].
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Delivers `event` to every current subscription on its topic, ordered by
    /// dependencies, then ascending priority, then registration order.
    ///
    /// Handler failures are reported on `subscriber_error` and in the
    /// returned report, never as an error.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::Closed`] after shutdown.
    async fn publish(&self, event: Event) -> EventBusResult<DeliveryReport>;

    /// Registers a batch of subscriptions atomically.
    ///
    /// Dependencies may reference existing subscriptions or other requests
    /// in the batch on the same topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::UnknownDependency`] or
    /// [`EventBusError::DependencyCycle`] when the dependency graph is
    /// invalid; nothing is registered in that case.
    async fn subscribe_all(
        &self,
        requests: Vec<SubscriptionRequest>,
    ) -> EventBusResult<Vec<SubscriptionId>>;

    /// Registers one subscription.
    ///
    /// # Errors
    ///
    /// See [`EventBus::subscribe_all`].
    async fn subscribe(&self, request: SubscriptionRequest) -> EventBusResult<SubscriptionId> {
        let id = request.id();
        self.subscribe_all(vec![request]).await?;
        Ok(id)
    }

    /// Removes a subscription, returning whether it existed. Idempotent.
    async fn unsubscribe(&self, id: SubscriptionId) -> EventBusResult<bool>;

    /// Returns the number of subscriptions on `topic`.
    async fn subscription_count(&self, topic: &Topic) -> usize;

    /// Rejects further publishes, awaits in-flight deliveries, and removes
    /// every subscription.
    async fn shutdown(&self);
}

/// Outcome of one publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Handlers that completed successfully.
    pub delivered: usize,
    /// Subscriptions whose handler failed or timed out.
    pub failed: Vec<SubscriptionId>,
}

/// A subscription to register: topic, handler, priority, and dependencies.
#[derive(Clone)]
pub struct SubscriptionRequest {
    id: SubscriptionId,
    topic: Topic,
    handler: Arc<dyn EventHandler>,
    priority: i32,
    depends_on: BTreeSet<SubscriptionId>,
}

impl SubscriptionRequest {
    /// Creates a request with priority 0 and no dependencies.
    #[must_use]
    pub fn new(topic: Topic, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            id: SubscriptionId::new(),
            topic,
            handler,
            priority: 0,
            depends_on: BTreeSet::new(),
        }
    }

    /// Sets the priority; lower values are delivered first.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Requires `dependency` to finish handling each event first.
    #[must_use]
    pub fn depends_on(mut self, dependency: SubscriptionId) -> Self {
        self.depends_on.insert(dependency);
        self
    }

    /// Returns the identifier the subscription will be registered under.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the topic.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns the handler.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn EventHandler> {
        Arc::clone(&self.handler)
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the dependencies.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeSet<SubscriptionId> {
        &self.depends_on
    }
}

impl fmt::Debug for SubscriptionRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SubscriptionRequest")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("priority", &self.priority)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

/// Errors returned by event bus implementations.
#[derive(Debug, Clone, Error)]
pub enum EventBusError {
    /// The bus has been shut down.
    #[error("event bus is shut down")]
    Closed,

    /// A subscription identifier is already registered.
    #[error("subscription {0} is already registered")]
    DuplicateSubscription(SubscriptionId),

    /// A dependency is not a subscription on the same topic.
    #[error("subscription {subscription} depends on {dependency}, which is not subscribed to the same topic")]
    UnknownDependency {
        /// Subscription declaring the dependency.
        subscription: SubscriptionId,
        /// Missing dependency.
        dependency: SubscriptionId,
    },

    /// The dependency graph on a topic contains a cycle.
    #[error("subscription dependencies on topic '{topic}' form a cycle")]
    DependencyCycle {
        /// Topic whose subscriptions form the cycle.
        topic: Topic,
        /// Subscriptions on or behind the cycle.
        members: Vec<SubscriptionId>,
    },

    /// Broker or adapter failure.
    #[error("event bus backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl EventBusError {
    /// Wraps a backend error.
    #[must_use]
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}
