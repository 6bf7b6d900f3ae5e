//! Event bus delivery and subscriber plugin tests.

use crate::in_memory::helpers::eventually;
use agentmate::event_bus::{
    adapters::InProcessEventBus,
    domain::{Event, SubscriberFailure, Topic},
    ports::{
        EventBus, EventBusError, EventHandler, HandlerError, Subscriber, SubscriptionRequest,
        handler_fn,
    },
    services::SubscriberManager,
};
use async_trait::async_trait;
use eyre::{Result, ensure};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type Journal = Arc<Mutex<Vec<String>>>;

#[fixture]
fn bus() -> Arc<InProcessEventBus<DefaultClock>> {
    Arc::new(InProcessEventBus::new(
        Duration::from_millis(500),
        Arc::new(DefaultClock),
    ))
}

fn topic(name: &str) -> Topic {
    Topic::new(name).expect("valid topic")
}

fn recorder(journal: &Journal, label: &'static str) -> Arc<dyn EventHandler> {
    let entries = Arc::clone(journal);
    handler_fn(move |_event| {
        let log = Arc::clone(&entries);
        async move {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(label.to_owned());
            Ok(())
        }
    })
}

fn failing(journal: &Journal, label: &'static str) -> Arc<dyn EventHandler> {
    let entries = Arc::clone(journal);
    handler_fn(move |_event| {
        let log = Arc::clone(&entries);
        async move {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(label.to_owned());
            Err(HandlerError::new("projection store offline"))
        }
    })
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dependents_run_after_their_dependencies(bus: Arc<InProcessEventBus<DefaultClock>>) -> Result<()> {
    let journal = Journal::default();
    let processed = topic("gmail.item.processed");
    let indexer = SubscriptionRequest::new(processed.clone(), recorder(&journal, "indexer"));
    let notifier = SubscriptionRequest::new(processed.clone(), recorder(&journal, "notifier"))
        .with_priority(-10)
        .depends_on(indexer.id());
    let auditor = SubscriptionRequest::new(processed.clone(), recorder(&journal, "auditor")).with_priority(5);
    bus.subscribe_all(vec![auditor, notifier, indexer]).await?;

    let report = bus
        .publish(Event::new(processed, json!({ "externalId": "e1" }), &DefaultClock))
        .await?;

    ensure!(report.delivered == 3);
    let order = entries(&journal);
    let position = |label: &str| order.iter().position(|seen| seen == label);
    ensure!(position("indexer") < position("notifier"), "order was {order:?}");
    ensure!(order.last().map(String::as_str) == Some("auditor"), "order was {order:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handler_failures_are_isolated_and_reported(bus: Arc<InProcessEventBus<DefaultClock>>) -> Result<()> {
    let journal = Journal::default();
    let failures: Arc<Mutex<Vec<SubscriberFailure>>> = Arc::default();
    let captured = Arc::clone(&failures);
    bus.subscribe(SubscriptionRequest::new(
        Topic::subscriber_error(),
        handler_fn(move |event| {
            let sink = Arc::clone(&captured);
            async move {
                let failure: SubscriberFailure = event
                    .payload_as()
                    .map_err(|err| HandlerError::from_error(&err))?;
                sink.lock().unwrap_or_else(PoisonError::into_inner).push(failure);
                Ok(())
            }
        }),
    ))
    .await?;
    let processed = topic("notion.item.processed");
    let broken = SubscriptionRequest::new(processed.clone(), failing(&journal, "projection"));
    let broken_id = broken.id();
    let dependent = SubscriptionRequest::new(processed.clone(), recorder(&journal, "search")).depends_on(broken_id);
    bus.subscribe_all(vec![broken, dependent]).await?;

    let report = bus
        .publish(Event::new(processed, json!({ "externalId": "n1" }), &DefaultClock))
        .await?;

    ensure!(report.failed == [broken_id]);
    ensure!(entries(&journal) == ["projection", "search"]);
    eventually("subscriber_error to be delivered", || {
        !failures.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    })
    .await?;
    let reported = failures.lock().unwrap_or_else(PoisonError::into_inner).clone();
    ensure!(reported.len() == 1);
    ensure!(reported.first().map(|failure| failure.subscription_id) == Some(broken_id));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_closes_the_bus(bus: Arc<InProcessEventBus<DefaultClock>>) -> Result<()> {
    let journal = Journal::default();
    let processed = topic("gmail.item.processed");
    bus.subscribe(SubscriptionRequest::new(processed.clone(), recorder(&journal, "late")))
        .await?;

    bus.shutdown().await;
    let outcome = bus.publish(Event::new(processed.clone(), json!({}), &DefaultClock)).await;

    ensure!(matches!(outcome, Err(EventBusError::Closed)));
    ensure!(bus.subscription_count(&processed).await == 0);
    ensure!(entries(&journal).is_empty());
    Ok(())
}

struct JournalSubscriber {
    name: &'static str,
    dependencies: Vec<String>,
    journal: Journal,
}

#[async_trait]
impl Subscriber for JournalSubscriber {
    fn name(&self) -> &str {
        self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn setup(&self) -> Result<Vec<SubscriptionRequest>, HandlerError> {
        Ok(vec![SubscriptionRequest::new(
            topic("gmail.cycle.completed"),
            recorder(&self.journal, self.name),
        )])
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn subscriber_plugins_start_in_dependency_order(bus: Arc<InProcessEventBus<DefaultClock>>) -> Result<()> {
    let journal = Journal::default();
    let mut manager = SubscriberManager::new(Arc::clone(&bus) as Arc<dyn EventBus>);
    manager.register(Arc::new(JournalSubscriber {
        name: "digest",
        dependencies: vec!["archive".to_owned()],
        journal: Arc::clone(&journal),
    }))?;
    manager.register(Arc::new(JournalSubscriber {
        name: "archive",
        dependencies: Vec::new(),
        journal: Arc::clone(&journal),
    }))?;

    let started = manager.start_all().await?;
    ensure!(started == ["archive", "digest"]);
    let completed = topic("gmail.cycle.completed");
    let report = bus.publish(Event::new(completed.clone(), json!({}), &DefaultClock)).await?;
    ensure!(report.delivered == 2);

    manager.stop_all().await;
    ensure!(manager.running().await.is_empty());
    ensure!(bus.subscription_count(&completed).await == 0);
    Ok(())
}
