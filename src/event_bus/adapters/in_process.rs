//! In-process event bus.

use crate::event_bus::{
    domain::{Event, SubscriberFailure, SubscriptionId, Topic},
    ports::{
        DeliveryReport, EventBus, EventBusError, EventBusResult, EventHandler, SubscriptionRequest,
    },
};
use crate::graph::{CycleDetected, topological_order};
use async_trait::async_trait;
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Notify;

const BUS_SOURCE: &str = "event_bus";

/// Delivery rank: ascending priority, then registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DeliveryRank {
    priority: i32,
    sequence: u64,
    id: SubscriptionId,
}

#[derive(Clone)]
struct Entry {
    rank: DeliveryRank,
    depends_on: BTreeSet<SubscriptionId>,
    handler: Arc<dyn EventHandler>,
}

#[derive(Clone)]
struct Delivery {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

/// Subscriptions on one topic plus their precomputed delivery order.
#[derive(Clone, Default)]
struct TopicSubscriptions {
    entries: BTreeMap<SubscriptionId, Entry>,
    order: Arc<[Delivery]>,
}

impl TopicSubscriptions {
    fn rebuild(&mut self) -> Result<(), CycleDetected<DeliveryRank>> {
        let graph: BTreeMap<DeliveryRank, BTreeSet<DeliveryRank>> = self
            .entries
            .values()
            .map(|entry| {
                let dependencies = entry
                    .depends_on
                    .iter()
                    .filter_map(|dependency| self.entries.get(dependency))
                    .map(|dependency| dependency.rank)
                    .collect();
                (entry.rank, dependencies)
            })
            .collect();
        let ranked = topological_order(&graph)?;
        self.order = ranked
            .into_iter()
            .filter_map(|rank| {
                self.entries.get(&rank.id).map(|entry| Delivery {
                    id: rank.id,
                    handler: Arc::clone(&entry.handler),
                })
            })
            .collect();
        Ok(())
    }
}

#[derive(Default)]
struct BusState {
    topics: HashMap<Topic, TopicSubscriptions>,
    index: HashMap<SubscriptionId, Topic>,
    next_sequence: u64,
}

/// Decrements the in-flight counter when a publish finishes or is dropped.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
    drained: &'a Notify,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// Event bus delivering to handlers in the publisher's task.
///
/// Handlers run sequentially per publish in dependency order, each bounded by
/// a timeout. The subscription table is locked only to snapshot or mutate it,
/// never while a handler runs, so publishers on unrelated topics do not wait
/// on each other.
pub struct InProcessEventBus<C>
where
    C: Clock + Send + Sync,
{
    state: RwLock<BusState>,
    closed: AtomicBool,
    in_flight: AtomicUsize,
    drained: Notify,
    handler_timeout: Duration,
    clock: Arc<C>,
}

impl<C> InProcessEventBus<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty bus bounding each handler call by `handler_timeout`.
    #[must_use]
    pub fn new(handler_timeout: Duration, clock: Arc<C>) -> Self {
        Self {
            state: RwLock::default(),
            closed: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
            handler_timeout,
            clock,
        }
    }

    fn snapshot(&self, topic: &Topic) -> EventBusResult<Arc<[Delivery]>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .topics
            .get(topic)
            .map_or_else(|| Arc::from(Vec::new()), |subscriptions| Arc::clone(&subscriptions.order)))
    }

    fn enter(&self) -> EventBusResult<InFlight<'_>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight {
            counter: &self.in_flight,
            drained: &self.drained,
        };
        if self.closed.load(Ordering::SeqCst) {
            return Err(EventBusError::Closed);
        }
        Ok(guard)
    }

    async fn deliver(&self, event: &Event, deliveries: &[Delivery]) -> (DeliveryReport, Vec<SubscriberFailure>) {
        let mut report = DeliveryReport::default();
        let mut failures = Vec::new();
        for delivery in deliveries {
            let outcome = tokio::time::timeout(self.handler_timeout, delivery.handler.handle(event)).await;
            let error = match outcome {
                Ok(Ok(())) => {
                    report.delivered = report.delivered.saturating_add(1);
                    continue;
                }
                Ok(Err(err)) => err.message().to_owned(),
                Err(_) => format!("handler timed out after {:?}", self.handler_timeout),
            };
            tracing::warn!(
                topic = %event.topic(),
                event_id = %event.id(),
                subscription = %delivery.id,
                error = %error,
                "event handler failed"
            );
            report.failed.push(delivery.id);
            failures.push(SubscriberFailure {
                subscription_id: delivery.id,
                topic: event.topic().clone(),
                event_id: event.id(),
                error,
            });
        }
        (report, failures)
    }

    async fn forward_failures(&self, cause: &Event, failures: Vec<SubscriberFailure>) {
        if failures.is_empty() || cause.topic().is_subscriber_error() {
            return;
        }
        let deliveries = match self.snapshot(&Topic::subscriber_error()) {
            Ok(deliveries) => deliveries,
            Err(err) => {
                tracing::warn!(error = %err, "cannot forward subscriber failures");
                return;
            }
        };
        for failure in failures {
            let forwarded = match Event::from_payload(Topic::subscriber_error(), &failure, &*self.clock) {
                Ok(forwarded) => forwarded
                    .with_source(BUS_SOURCE)
                    .with_correlation_id(cause.id()),
                Err(err) => {
                    tracing::warn!(error = %err, "cannot encode subscriber failure");
                    continue;
                }
            };
            self.deliver(&forwarded, &deliveries).await;
        }
    }
}

fn poisoned(err: impl std::fmt::Display) -> EventBusError {
    EventBusError::backend(std::io::Error::other(err.to_string()))
}

fn stage_request(
    staged: &mut BTreeMap<Topic, TopicSubscriptions>,
    state: &mut BusState,
    request: SubscriptionRequest,
) {
    let topic = request.topic().clone();
    let subscriptions = staged
        .entry(topic.clone())
        .or_insert_with(|| state.topics.get(&topic).cloned().unwrap_or_default());
    let sequence = state.next_sequence;
    state.next_sequence = state.next_sequence.saturating_add(1);
    subscriptions.entries.insert(
        request.id(),
        Entry {
            rank: DeliveryRank {
                priority: request.priority(),
                sequence,
                id: request.id(),
            },
            depends_on: request.dependencies().clone(),
            handler: request.handler(),
        },
    );
}

#[async_trait]
impl<C> EventBus for InProcessEventBus<C>
where
    C: Clock + Send + Sync,
{
    async fn publish(&self, event: Event) -> EventBusResult<DeliveryReport> {
        let _in_flight = self.enter()?;
        let deliveries = self.snapshot(event.topic())?;
        tracing::debug!(
            topic = %event.topic(),
            event_id = %event.id(),
            subscribers = deliveries.len(),
            "publishing event"
        );
        let (report, failures) = self.deliver(&event, &deliveries).await;
        self.forward_failures(&event, failures).await;
        Ok(report)
    }

    async fn subscribe_all(
        &self,
        requests: Vec<SubscriptionRequest>,
    ) -> EventBusResult<Vec<SubscriptionId>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EventBusError::Closed);
        }
        let mut state = self.state.write().map_err(poisoned)?;

        let mut seen = BTreeSet::new();
        for request in &requests {
            if state.index.contains_key(&request.id()) || !seen.insert(request.id()) {
                return Err(EventBusError::DuplicateSubscription(request.id()));
            }
        }

        let ids: Vec<SubscriptionId> = requests.iter().map(SubscriptionRequest::id).collect();
        let dependencies: Vec<(SubscriptionId, Topic, BTreeSet<SubscriptionId>)> = requests
            .iter()
            .map(|request| (request.id(), request.topic().clone(), request.dependencies().clone()))
            .collect();

        let mut staged = BTreeMap::new();
        for request in requests {
            stage_request(&mut staged, &mut state, request);
        }

        for (subscription, topic, depends_on) in &dependencies {
            let entries = staged.get(topic).map(|subscriptions| &subscriptions.entries);
            if let Some(dependency) = depends_on
                .iter()
                .find(|dependency| !entries.is_some_and(|known| known.contains_key(*dependency)))
            {
                return Err(EventBusError::UnknownDependency {
                    subscription: *subscription,
                    dependency: *dependency,
                });
            }
        }

        for (topic, subscriptions) in &mut staged {
            subscriptions
                .rebuild()
                .map_err(|CycleDetected(members)| EventBusError::DependencyCycle {
                    topic: topic.clone(),
                    members: members.into_iter().map(|rank| rank.id).collect(),
                })?;
        }

        for (subscription, topic, _) in dependencies {
            tracing::debug!(%topic, %subscription, "subscription registered");
            state.index.insert(subscription, topic);
        }
        state.topics.extend(staged);
        Ok(ids)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> EventBusResult<bool> {
        let mut state = self.state.write().map_err(poisoned)?;
        let Some(topic) = state.index.remove(&id) else {
            return Ok(false);
        };
        if let Some(subscriptions) = state.topics.get_mut(&topic) {
            subscriptions.entries.remove(&id);
            if subscriptions.entries.is_empty() {
                state.topics.remove(&topic);
            } else if let Err(CycleDetected(members)) = subscriptions.rebuild() {
                tracing::warn!(%topic, ?members, "dependency cycle after unsubscribe");
            }
        }
        tracing::debug!(%topic, subscription = %id, "subscription removed");
        Ok(true)
    }

    async fn subscription_count(&self, topic: &Topic) -> usize {
        self.state.read().map_or(0, |state| {
            state
                .topics
                .get(topic)
                .map_or(0, |subscriptions| subscriptions.entries.len())
        })
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        loop {
            let drained = self.drained.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            drained.await;
        }
        match self.state.write() {
            Ok(mut state) => {
                state.topics.clear();
                state.index.clear();
            }
            Err(err) => tracing::warn!(error = %err, "event bus state poisoned during shutdown"),
        }
        tracing::info!("event bus shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::ports::{HandlerError, handler_fn};
    use eyre::{Result, bail, ensure};
    use mockable::DefaultClock;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    #[fixture]
    fn bus() -> Arc<InProcessEventBus<DefaultClock>> {
        Arc::new(InProcessEventBus::new(
            Duration::from_secs(1),
            Arc::new(DefaultClock),
        ))
    }

    fn topic() -> Topic {
        Topic::new("gmail.inbox.classify").expect("valid topic")
    }

    fn event(topic: Topic) -> Event {
        Event::new(topic, json!({"n": 1}), &DefaultClock)
    }

    fn recorder(log: &Log, label: &'static str) -> Arc<dyn EventHandler> {
        let shared = Arc::clone(log);
        handler_fn(move |_| {
            let entries = Arc::clone(&shared);
            async move {
                entries.lock().expect("log lock").push(label);
                Ok(())
            }
        })
    }

    fn failing() -> Arc<dyn EventHandler> {
        handler_fn(|_| async { Err(HandlerError::new("boom")) })
    }

    #[rstest]
    #[tokio::test]
    async fn delivers_by_priority_then_registration_order(
        bus: Arc<InProcessEventBus<DefaultClock>>,
    ) -> Result<()> {
        let log = Log::default();
        bus.subscribe(SubscriptionRequest::new(topic(), recorder(&log, "late")).with_priority(5))
            .await?;
        bus.subscribe(SubscriptionRequest::new(topic(), recorder(&log, "first")).with_priority(-1))
            .await?;
        bus.subscribe(SubscriptionRequest::new(topic(), recorder(&log, "second")).with_priority(-1))
            .await?;

        let report = bus.publish(event(topic())).await?;
        ensure!(report.delivered == 3);
        ensure!(*log.lock().expect("log lock") == vec!["first", "second", "late"]);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn dependencies_override_priority(bus: Arc<InProcessEventBus<DefaultClock>>) -> Result<()> {
        let log = Log::default();
        let a = SubscriptionRequest::new(topic(), recorder(&log, "a")).with_priority(10);
        let b = SubscriptionRequest::new(topic(), recorder(&log, "b"))
            .with_priority(-10)
            .depends_on(a.id());
        bus.subscribe_all(vec![b, a]).await?;

        bus.publish(event(topic())).await?;
        ensure!(*log.lock().expect("log lock") == vec!["a", "b"]);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn rejects_dependency_cycles_atomically(
        bus: Arc<InProcessEventBus<DefaultClock>>,
    ) -> Result<()> {
        let log = Log::default();
        let mut a = SubscriptionRequest::new(topic(), recorder(&log, "a"));
        let b = SubscriptionRequest::new(topic(), recorder(&log, "b")).depends_on(a.id());
        a = a.depends_on(b.id());

        match bus.subscribe_all(vec![a, b]).await {
            Err(EventBusError::DependencyCycle { members, .. }) => ensure!(members.len() == 2),
            other => bail!("expected DependencyCycle, got {other:?}"),
        }
        ensure!(bus.subscription_count(&topic()).await == 0);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn rejects_dependencies_on_other_topics(
        bus: Arc<InProcessEventBus<DefaultClock>>,
    ) -> Result<()> {
        let log = Log::default();
        let other = bus
            .subscribe(SubscriptionRequest::new(Topic::new("notion.page.sync")?, recorder(&log, "x")))
            .await?;
        let result = bus
            .subscribe(SubscriptionRequest::new(topic(), recorder(&log, "y")).depends_on(other))
            .await;
        ensure!(matches!(result, Err(EventBusError::UnknownDependency { dependency, .. }) if dependency == other));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn handler_failures_are_isolated_and_forwarded(
        bus: Arc<InProcessEventBus<DefaultClock>>,
    ) -> Result<()> {
        let log = Log::default();
        let forwarded = Arc::new(Mutex::new(Vec::<Event>::new()));
        let sink = Arc::clone(&forwarded);
        bus.subscribe(SubscriptionRequest::new(
            Topic::subscriber_error(),
            handler_fn(move |event| {
                let events = Arc::clone(&sink);
                async move {
                    events.lock().expect("sink lock").push(event);
                    Ok(())
                }
            }),
        ))
        .await?;
        let failing_id = bus
            .subscribe(SubscriptionRequest::new(topic(), failing()).with_priority(-1))
            .await?;
        bus.subscribe(SubscriptionRequest::new(topic(), recorder(&log, "after")))
            .await?;

        let published = event(topic());
        let report = bus.publish(published.clone()).await?;
        ensure!(report.delivered == 1);
        ensure!(report.failed == vec![failing_id]);
        ensure!(*log.lock().expect("log lock") == vec!["after"]);

        let events = forwarded.lock().expect("sink lock").clone();
        ensure!(events.len() == 1);
        let failure: SubscriberFailure = events.first().expect("forwarded event").payload_as()?;
        ensure!(failure.subscription_id == failing_id);
        ensure!(failure.event_id == published.id());
        ensure!(failure.error == "boom");
        ensure!(events.first().and_then(Event::correlation_id) == Some(published.id()));
        Ok(())
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn slow_handlers_time_out(bus: Arc<InProcessEventBus<DefaultClock>>) -> Result<()> {
        let id = bus
            .subscribe(SubscriptionRequest::new(
                topic(),
                handler_fn(|_| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }),
            ))
            .await?;
        let report = bus.publish(event(topic())).await?;
        ensure!(report.failed == vec![id]);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn unsubscribe_is_idempotent(bus: Arc<InProcessEventBus<DefaultClock>>) -> Result<()> {
        let log = Log::default();
        let id = bus
            .subscribe(SubscriptionRequest::new(topic(), recorder(&log, "gone")))
            .await?;
        ensure!(bus.unsubscribe(id).await?);
        ensure!(!bus.unsubscribe(id).await?);
        let report = bus.publish(event(topic())).await?;
        ensure!(report == DeliveryReport::default());
        ensure!(log.lock().expect("log lock").is_empty());
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_awaits_in_flight_delivery_and_clears(
        bus: Arc<InProcessEventBus<DefaultClock>>,
    ) -> Result<()> {
        let (sender, entered_rx) = tokio::sync::oneshot::channel::<()>();
        let entered_tx = Arc::new(Mutex::new(Some(sender)));
        let finished = Arc::new(AtomicBool::new(false));
        let finished_flag = Arc::clone(&finished);
        bus.subscribe(SubscriptionRequest::new(
            topic(),
            handler_fn(move |_| {
                let entered = Arc::clone(&entered_tx);
                let flag = Arc::clone(&finished_flag);
                async move {
                    if let Some(signal) = entered.lock().expect("sender lock").take() {
                        signal.send(()).expect("test awaits entry");
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }),
        ))
        .await?;

        let publisher = Arc::clone(&bus);
        let publish = tokio::spawn(async move { publisher.publish(event(topic())).await });
        entered_rx.await?;
        bus.shutdown().await;

        ensure!(finished.load(Ordering::SeqCst));
        ensure!(publish.await??.delivered == 1);
        ensure!(bus.subscription_count(&topic()).await == 0);
        ensure!(matches!(bus.publish(event(topic())).await, Err(EventBusError::Closed)));
        Ok(())
    }
}
