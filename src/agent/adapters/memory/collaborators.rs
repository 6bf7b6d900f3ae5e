//! Scripted data source, echo engine, and recording sink.

use crate::agent::{
    domain::{EngineKind, ExternalId, FetchBatch, FetchCursor, ProcessedItem, WorkItem},
    ports::{DataSourceClient, EngineError, ProcessingEngine, Sink, SinkError, SourceError},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts one in-flight fetch until dropped, including by cancellation.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(active: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        peak.fetch_max(now, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Data source replaying a queue of scripted fetch outcomes.
///
/// Once the script is exhausted every fetch returns an empty batch.
#[derive(Debug)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<FetchBatch, SourceError>>>,
    cursors: Mutex<Vec<Option<FetchCursor>>>,
    authenticated: AtomicBool,
    fetch_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self {
            script: Mutex::default(),
            cursors: Mutex::default(),
            authenticated: AtomicBool::new(true),
            fetch_delay: Mutex::default(),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedSource {
    /// Creates an authenticated source with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a batch of items identified by `external_ids`.
    pub fn push_items<I, S>(&self, external_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items = external_ids
            .into_iter()
            .filter_map(|id| ExternalId::new(id.as_ref()).ok())
            .map(|id| {
                let payload = json!({ "subject": format!("message {}", id.as_str()) });
                WorkItem::new(id, payload)
            })
            .collect();
        self.push_batch(FetchBatch::new(items, None));
    }

    /// Queues a complete batch.
    pub fn push_batch(&self, batch: FetchBatch) {
        lock(&self.script).push_back(Ok(batch));
    }

    /// Queues a failed fetch.
    pub fn push_failure(&self, err: SourceError) {
        lock(&self.script).push_back(Err(err));
    }

    /// Sets the authentication answer.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    /// Delays every subsequent fetch by `delay`.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *lock(&self.fetch_delay) = delay;
    }

    /// Returns the cursor passed to each fetch so far.
    #[must_use]
    pub fn cursors(&self) -> Vec<Option<FetchCursor>> {
        lock(&self.cursors).clone()
    }

    /// Returns how many fetches were made.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        lock(&self.cursors).len()
    }

    /// Returns the most fetches ever in flight at once.
    #[must_use]
    pub fn peak_concurrent_fetches(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSourceClient for ScriptedSource {
    async fn fetch(
        &self,
        cursor: Option<FetchCursor>,
        _batch_size: usize,
    ) -> Result<FetchBatch, SourceError> {
        let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        lock(&self.cursors).push(cursor);
        let delay = *lock(&self.fetch_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let next = lock(&self.script).pop_front();
        next.unwrap_or_else(|| Ok(FetchBatch::default()))
    }

    async fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }
}

/// Engine returning a JSON echo of the item and stage.
#[derive(Debug, Default)]
pub struct EchoEngine {
    failing: Mutex<BTreeSet<(String, EngineKind)>>,
    calls: AtomicUsize,
}

impl EchoEngine {
    /// Creates an engine that succeeds for every item.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `kind` fail transiently for the item with `external_id`.
    pub fn fail_for(&self, external_id: &str, kind: EngineKind) {
        lock(&self.failing).insert((external_id.to_owned(), kind));
    }

    /// Clears scripted failures.
    pub fn heal(&self) {
        lock(&self.failing).clear();
    }

    /// Returns how many engine calls were made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessingEngine for EchoEngine {
    async fn process(&self, item: &WorkItem, kind: EngineKind) -> Result<Value, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let external_id = item.external_id().as_str();
        if lock(&self.failing).contains(&(external_id.to_owned(), kind)) {
            return Err(EngineError::Transient(format!("{kind} unavailable")));
        }
        Ok(json!({ "stage": kind.as_str(), "externalId": external_id }))
    }
}

/// Sink recording every dispatched item.
#[derive(Debug, Default)]
pub struct RecordingSink {
    dispatched: Mutex<Vec<ProcessedItem>>,
    failing: Mutex<BTreeSet<String>>,
    delay: Mutex<Duration>,
}

impl RecordingSink {
    /// Creates a sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects dispatches for `external_id` until healed.
    pub fn fail_for(&self, external_id: &str) {
        lock(&self.failing).insert(external_id.to_owned());
    }

    /// Clears scripted failures.
    pub fn heal(&self) {
        lock(&self.failing).clear();
    }

    /// Delays every dispatch by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    /// Returns dispatched items in dispatch order.
    #[must_use]
    pub fn dispatched(&self) -> Vec<ProcessedItem> {
        lock(&self.dispatched).clone()
    }

    /// Returns dispatched external identifiers in dispatch order.
    #[must_use]
    pub fn dispatched_ids(&self) -> Vec<String> {
        lock(&self.dispatched)
            .iter()
            .map(|item| item.external_id().as_str().to_owned())
            .collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn dispatch(&self, item: &ProcessedItem) -> Result<(), SinkError> {
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if lock(&self.failing).contains(item.external_id().as_str()) {
            return Err(SinkError::Transient("downstream unavailable".to_owned()));
        }
        lock(&self.dispatched).push(item.clone());
        Ok(())
    }
}
