//! Start and stop orchestration for subscriber plugins.

use crate::event_bus::{
    domain::SubscriptionId,
    ports::{EventBus, EventBusError, HandlerError, Subscriber},
};
use crate::graph::{CycleDetected, topological_order};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors raised while managing subscribers.
#[derive(Debug, Clone, Error)]
pub enum SubscriberManagerError {
    /// A subscriber with the same name is already registered.
    #[error("subscriber '{0}' is already registered")]
    DuplicateSubscriber(String),

    /// No subscriber with the given name is registered.
    #[error("subscriber '{0}' is not registered")]
    UnknownSubscriber(String),

    /// Subscriber dependencies form a cycle.
    #[error("subscriber dependencies form a cycle: {0:?}")]
    DependencyCycle(Vec<String>),

    /// The subscriber's setup hook failed.
    #[error("subscriber '{name}' failed to set up: {source}")]
    Setup {
        /// Subscriber name.
        name: String,
        /// Setup failure.
        source: HandlerError,
    },

    /// The bus rejected the subscriber's subscriptions.
    #[error(transparent)]
    Bus(#[from] EventBusError),
}

/// Result type for subscriber manager operations.
pub type SubscriberManagerResult<T> = Result<T, SubscriberManagerError>;

struct Registered {
    subscriber: Arc<dyn Subscriber>,
    enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct StartKey {
    priority: Reverse<i32>,
    name: String,
}

#[derive(Default)]
struct Running {
    order: Vec<String>,
    subscriptions: BTreeMap<String, Vec<SubscriptionId>>,
}

/// Starts registered subscribers in dependency order and stops them in
/// reverse.
///
/// Among subscribers whose dependencies have started, higher priority starts
/// first, then name order. Disabled subscribers are skipped; their dependents
/// still start.
pub struct SubscriberManager {
    bus: Arc<dyn EventBus>,
    registered: BTreeMap<String, Registered>,
    running: Mutex<Running>,
}

impl SubscriberManager {
    /// Creates a manager registering subscriptions on `bus`.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self {
            bus,
            registered: BTreeMap::new(),
            running: Mutex::default(),
        }
    }

    /// Registers a subscriber, enabled according to its default.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberManagerError::DuplicateSubscriber`] when the name
    /// is taken.
    pub fn register(&mut self, subscriber: Arc<dyn Subscriber>) -> SubscriberManagerResult<()> {
        let name = subscriber.name().to_owned();
        if self.registered.contains_key(&name) {
            return Err(SubscriberManagerError::DuplicateSubscriber(name));
        }
        let enabled = subscriber.enabled_by_default();
        self.registered.insert(name, Registered { subscriber, enabled });
        Ok(())
    }

    /// Overrides whether a subscriber starts with [`Self::start_all`].
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberManagerError::UnknownSubscriber`] when no
    /// subscriber has `name`.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> SubscriberManagerResult<()> {
        let registered = self
            .registered
            .get_mut(name)
            .ok_or_else(|| SubscriberManagerError::UnknownSubscriber(name.to_owned()))?;
        registered.enabled = enabled;
        Ok(())
    }

    /// Returns the names of enabled subscribers in start order.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberManagerError::DependencyCycle`] when dependencies
    /// are cyclic.
    pub fn start_order(&self) -> SubscriberManagerResult<Vec<String>> {
        let keys: BTreeMap<&str, StartKey> = self
            .registered
            .iter()
            .map(|(name, registered)| {
                (
                    name.as_str(),
                    StartKey {
                        priority: Reverse(registered.subscriber.priority()),
                        name: name.clone(),
                    },
                )
            })
            .collect();
        let graph: BTreeMap<StartKey, BTreeSet<StartKey>> = self
            .registered
            .iter()
            .filter_map(|(name, registered)| {
                let key = keys.get(name.as_str())?.clone();
                let dependencies = registered
                    .subscriber
                    .dependencies()
                    .iter()
                    .filter_map(|dependency| {
                        let found = keys.get(dependency.as_str()).cloned();
                        if found.is_none() {
                            tracing::warn!(subscriber = %name, dependency = %dependency, "unknown subscriber dependency");
                        }
                        found
                    })
                    .collect();
                Some((key, dependencies))
            })
            .collect();
        let ordered = topological_order(&graph).map_err(|CycleDetected(members)| {
            SubscriberManagerError::DependencyCycle(members.into_iter().map(|key| key.name).collect())
        })?;
        Ok(ordered
            .into_iter()
            .map(|key| key.name)
            .filter(|name| {
                let enabled = self.registered.get(name).is_some_and(|registered| registered.enabled);
                if !enabled {
                    tracing::debug!(subscriber = %name, "skipping disabled subscriber");
                }
                enabled
            })
            .collect())
    }

    /// Starts every enabled subscriber that is not already running.
    ///
    /// A subscriber whose setup fails is logged and skipped. Returns the
    /// names started by this call.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberManagerError::DependencyCycle`] before starting
    /// anything when dependencies are cyclic.
    pub async fn start_all(&self) -> SubscriberManagerResult<Vec<String>> {
        let mut started = Vec::new();
        for name in self.start_order()? {
            match self.start(&name).await {
                Ok(true) => started.push(name),
                Ok(false) => {}
                Err(err) => tracing::warn!(subscriber = %name, error = %err, "subscriber failed to start"),
            }
        }
        tracing::info!(count = started.len(), "subscribers started");
        Ok(started)
    }

    /// Starts one subscriber, returning `false` when it is already running.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberManagerError::UnknownSubscriber`],
    /// [`SubscriberManagerError::Setup`], or [`SubscriberManagerError::Bus`].
    pub async fn start(&self, name: &str) -> SubscriberManagerResult<bool> {
        let registered = self
            .registered
            .get(name)
            .ok_or_else(|| SubscriberManagerError::UnknownSubscriber(name.to_owned()))?;
        let mut running = self.running.lock().await;
        if running.subscriptions.contains_key(name) {
            tracing::debug!(subscriber = name, "subscriber already running");
            return Ok(false);
        }
        let requests = registered
            .subscriber
            .setup()
            .await
            .map_err(|source| SubscriberManagerError::Setup {
                name: name.to_owned(),
                source,
            })?;
        let ids = self.bus.subscribe_all(requests).await?;
        tracing::info!(subscriber = name, subscriptions = ids.len(), "subscriber started");
        running.order.push(name.to_owned());
        running.subscriptions.insert(name.to_owned(), ids);
        Ok(true)
    }

    /// Removes a running subscriber's subscriptions and calls its stop hook.
    /// Returns `false` when it was not running.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberManagerError::Bus`] when unsubscribing fails.
    pub async fn stop(&self, name: &str) -> SubscriberManagerResult<bool> {
        let mut running = self.running.lock().await;
        let Some(ids) = running.subscriptions.remove(name) else {
            return Ok(false);
        };
        running.order.retain(|started| started != name);
        drop(running);
        for id in ids {
            self.bus.unsubscribe(id).await?;
        }
        if let Some(registered) = self.registered.get(name)
            && let Err(err) = registered.subscriber.stop().await
        {
            tracing::warn!(subscriber = name, error = %err, "subscriber stop hook failed");
        }
        tracing::info!(subscriber = name, "subscriber stopped");
        Ok(true)
    }

    /// Stops every running subscriber in reverse start order.
    pub async fn stop_all(&self) {
        let order = self.running.lock().await.order.clone();
        for name in order.iter().rev() {
            if let Err(err) = self.stop(name).await {
                tracing::warn!(subscriber = %name, error = %err, "subscriber failed to stop");
            }
        }
    }

    /// Returns running subscriber names in start order.
    pub async fn running(&self) -> Vec<String> {
        self.running.lock().await.order.clone()
    }
}
