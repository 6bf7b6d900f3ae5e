//! Operating cycles driven end to end through the supervisor.

use crate::in_memory::helpers::{Runtime, eventually, fast_settings, key};
use agentmate::{
    agent::domain::{ExternalId, LifecyclePayload, cycle_completed_topic},
    config::domain::{ConfigValues, RuntimeSettings},
    dedup::domain::DedupKey,
    event_bus::ports::{HandlerError, SubscriptionRequest, handler_fn},
};
use eyre::{Result, ensure};
use rstest::rstest;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_items_are_dispatched_once(fast_settings: RuntimeSettings) -> Result<()> {
    let runtime = Runtime::new(fast_settings)?;
    let gmail = key("u1", "gmail");
    runtime
        .configure(&gmail, ConfigValues::new().with("interval_ms", json!(20)))
        .await?;
    let agent = runtime.agent(&gmail);
    agent.scripted_source().push_items(["e1", "e2"]);
    agent.scripted_source().push_items(["e2", "e3"]);

    let counts: Arc<Mutex<Vec<usize>>> = Arc::default();
    let log = Arc::clone(&counts);
    runtime
        .supervisor
        .context()
        .bus()
        .subscribe(SubscriptionRequest::new(
            cycle_completed_topic(gmail.service()),
            handler_fn(move |event| {
                let entries = Arc::clone(&log);
                async move {
                    let payload: LifecyclePayload = event
                        .payload_as()
                        .map_err(|err| HandlerError::from_error(&err))?;
                    entries
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(payload.item_count);
                    Ok(())
                }
            }),
        ))
        .await?;

    runtime.supervisor.start(&gmail).await?;
    eventually("both scripted batches to be fetched", || {
        agent.scripted_source().fetch_count() >= 3
    })
    .await?;
    runtime.supervisor.stop(&gmail).await?;

    ensure!(agent.recording_sink().dispatched_ids() == ["e1", "e2", "e3"]);
    let observed = counts.lock().unwrap_or_else(PoisonError::into_inner).clone();
    ensure!(observed.starts_with(&[2, 1]), "unexpected cycle counts {observed:?}");

    let ledger = runtime.supervisor.context().ledger();
    let records = ledger.records_for(&gmail).await?;
    ensure!(records.len() == 3);
    for external in ["e1", "e2", "e3"] {
        let dedup_key = DedupKey::new(gmail.clone(), ExternalId::new(external)?);
        ensure!(!ledger.should_process(&dedup_key).await?, "{external} should be marked");
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn owners_keep_separate_ledgers(fast_settings: RuntimeSettings) -> Result<()> {
    let runtime = Runtime::new(fast_settings)?;
    let first = key("u1", "gmail");
    let second = key("u2", "gmail");
    for owner_key in [&first, &second] {
        runtime
            .configure(owner_key, ConfigValues::new().with("interval_ms", json!(20)))
            .await?;
        runtime.agent(owner_key).scripted_source().push_items(["shared"]);
    }

    let report = runtime.supervisor.start_all().await?;
    ensure!(report.is_complete());
    eventually("both owners to dispatch", || {
        runtime.agent(&first).recording_sink().dispatched_ids().len() == 1
            && runtime.agent(&second).recording_sink().dispatched_ids().len() == 1
    })
    .await?;
    runtime.supervisor.stop_all().await;

    let ledger = runtime.supervisor.context().ledger();
    ensure!(ledger.records_for(&first).await?.len() == 1);
    ensure!(ledger.records_for(&second).await?.len() == 1);
    Ok(())
}
