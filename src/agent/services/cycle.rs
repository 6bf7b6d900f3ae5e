//! One operating cycle: fetch, dedup-filter, process, dispatch, mark.

use super::ControlSignal;
use crate::agent::{
    domain::{
        AgentKey, CycleId, EngineKind, EngineOutput, ExternalId, FetchBatch, FetchCursor,
        LifecyclePayload, LifecycleStatus, ProcessedItem, ProcessingMode, WorkItem,
        cycle_completed_topic, item_processed_topic,
    },
    ports::{Agent, EngineError, SourceError},
};
use crate::config::domain::AgentConfig;
use crate::context::RuntimeContext;
use crate::dedup::{
    domain::{DedupKey, DedupRecord},
    ports::DedupError,
};
use crate::resilience::{RetryError, RetryPolicy};
use mockable::Clock;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

const CYCLE_SOURCE: &str = "agent.cycle";

/// Reasons a cycle ends without reaching the processing stage.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The data source reported the owner is not authenticated.
    #[error("owner is not authenticated with the data source")]
    NotAuthenticated,

    /// Fetching failed after retries or with a non-retryable error.
    #[error(transparent)]
    Source(RetryError<SourceError>),

    /// The dedup ledger could not be consulted.
    #[error(transparent)]
    Ledger(#[from] DedupError),

    /// A stop request arrived during the fetch.
    #[error("cycle interrupted by stop request")]
    Stopped,
}

/// Outcome of a cycle that reached the processing stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle identity.
    pub cycle_id: CycleId,
    /// Items returned by the fetch.
    pub fetched: usize,
    /// Items skipped because the ledger already recorded them.
    pub duplicates: usize,
    /// Items dispatched and marked processed, in order.
    pub dispatched: Vec<ExternalId>,
    /// Items dropped after an engine failure; retried next cycle.
    pub engine_failures: usize,
    /// Items the sink rejected; retried next cycle.
    pub sink_failures: usize,
    /// Whether a stop request cut the cycle short.
    pub interrupted: bool,
}

impl CycleReport {
    fn new(cycle_id: CycleId) -> Self {
        Self {
            cycle_id,
            fetched: 0,
            duplicates: 0,
            dispatched: Vec::new(),
            engine_failures: 0,
            sink_failures: 0,
            interrupted: false,
        }
    }

    /// Returns the lifecycle status published for this cycle.
    #[must_use]
    pub const fn status(&self) -> LifecycleStatus {
        if self.engine_failures == 0 && self.sink_failures == 0 && !self.interrupted {
            LifecycleStatus::Completed
        } else {
            LifecycleStatus::Partial
        }
    }
}

/// Executes cycles for one instance, carrying the fetch cursor between
/// them.
///
/// Cycles of one executor run strictly one after another; the executor is
/// owned by a single run-loop.
pub struct CycleExecutor<C>
where
    C: Clock + Send + Sync + 'static,
{
    key: AgentKey,
    agent: Arc<dyn Agent>,
    config: AgentConfig,
    context: Arc<RuntimeContext<C>>,
    engine_retry: RetryPolicy,
    cursor: Option<FetchCursor>,
}

impl<C> CycleExecutor<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates an executor for `key`.
    #[must_use]
    pub fn new(
        key: AgentKey,
        agent: Arc<dyn Agent>,
        config: AgentConfig,
        context: Arc<RuntimeContext<C>>,
    ) -> Self {
        let settings = context.settings();
        let engine_retry =
            RetryPolicy::from_settings(&settings.retry).with_max_attempts(settings.cycle.engine_max_attempts);
        Self {
            key,
            agent,
            config,
            context,
            engine_retry,
            cursor: None,
        }
    }

    /// Returns the cursor the next fetch resumes from.
    #[must_use]
    pub const fn cursor(&self) -> Option<&FetchCursor> {
        self.cursor.as_ref()
    }

    /// Runs one cycle.
    ///
    /// Per-item engine and sink failures are counted in the report and never
    /// abort the cycle. Dispatch and mark run to completion once started, so
    /// a stop never leaves an item dispatched but unmarked.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError`] when the fetch or dedup stage fails or a stop
    /// arrives during the fetch.
    pub async fn run_cycle(&mut self, signal: &ControlSignal) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::new(CycleId::new());
        let batch = match self.fetch(signal).await {
            Ok(batch) => batch,
            Err(CycleError::Stopped) => return Err(CycleError::Stopped),
            Err(err) => {
                self.publish_cycle(&report, LifecycleStatus::FetchFailed).await;
                return Err(err);
            }
        };
        let FetchBatch { items, next_cursor } = batch;
        if next_cursor.is_some() {
            self.cursor = next_cursor;
        }
        report.fetched = items.len();
        let fresh = self.unprocessed(items, &mut report).await?;
        tracing::debug!(
            agent = %self.key,
            cycle = %report.cycle_id,
            fetched = report.fetched,
            fresh = fresh.len(),
            "cycle fetched work items"
        );

        for item in fresh {
            let outputs = tokio::select! {
                outputs = self.process(&item) => outputs,
                () = signal.stop_requested() => {
                    report.interrupted = true;
                    break;
                }
            };
            let Some(outputs) = outputs else {
                report.engine_failures = report.engine_failures.saturating_add(1);
                continue;
            };
            let processed = ProcessedItem::new(
                self.key.clone(),
                report.cycle_id,
                item.external_id().clone(),
                outputs,
            );
            if self.dispatch_and_mark(&processed).await {
                report.dispatched.push(item.external_id().clone());
            } else {
                report.sink_failures = report.sink_failures.saturating_add(1);
            }
            if signal.is_stop_requested() {
                report.interrupted = true;
                break;
            }
        }

        self.publish_cycle(&report, report.status()).await;
        tracing::info!(
            agent = %self.key,
            cycle = %report.cycle_id,
            dispatched = report.dispatched.len(),
            duplicates = report.duplicates,
            engine_failures = report.engine_failures,
            sink_failures = report.sink_failures,
            "cycle finished"
        );
        Ok(report)
    }

    async fn fetch(&self, signal: &ControlSignal) -> Result<FetchBatch, CycleError> {
        let source = self.agent.source();
        if !source.is_authenticated().await {
            return Err(CycleError::NotAuthenticated);
        }
        let client = source.as_ref();
        let limiter = self.context.rate_limiter();
        let key = &self.key;
        let cursor = &self.cursor;
        let batch_size = self.config.batch_size();
        let timeout = self.context.settings().cycle.stage_timeout();
        let seed = key.to_string();

        let attempts = self.context.retry_policy().execute(&seed, |_| async move {
            if let Err(exceeded) = limiter.acquire(key).await {
                return Err(SourceError::RateLimited {
                    retry_after: exceeded.retry_after,
                });
            }
            tokio::time::timeout(timeout, client.fetch(cursor.clone(), batch_size))
                .await
                .unwrap_or_else(|_| Err(SourceError::Transient(format!("fetch timed out after {timeout:?}"))))
        });

        tokio::select! {
            outcome = attempts => outcome.map_err(|err| match err {
                RetryError::Rejected(SourceError::NotAuthenticated) => CycleError::NotAuthenticated,
                other => CycleError::Source(other),
            }),
            () = signal.stop_requested() => Err(CycleError::Stopped),
        }
    }

    async fn unprocessed(
        &self,
        items: Vec<WorkItem>,
        report: &mut CycleReport,
    ) -> Result<Vec<WorkItem>, CycleError> {
        let ledger = self.context.ledger();
        let mut seen = HashSet::new();
        let mut fresh = Vec::with_capacity(items.len());
        for item in items {
            let key = DedupKey::new(self.key.clone(), item.external_id().clone());
            if seen.insert(item.external_id().clone()) && ledger.should_process(&key).await? {
                fresh.push(item);
            } else {
                report.duplicates = report.duplicates.saturating_add(1);
            }
        }
        Ok(fresh)
    }

    async fn process(&self, item: &WorkItem) -> Option<Vec<EngineOutput>> {
        let outcome = match self.config.processing_mode() {
            ProcessingMode::Summarize => self.run_engine(item, EngineKind::Summarize).await.map(|output| vec![output]),
            ProcessingMode::Classify => self.run_engine(item, EngineKind::Classify).await.map(|output| vec![output]),
            ProcessingMode::Both => {
                let (summary, classification) = tokio::join!(
                    self.run_engine(item, EngineKind::Summarize),
                    self.run_engine(item, EngineKind::Classify),
                );
                summary.and_then(|first| classification.map(|second| vec![first, second]))
            }
        };
        outcome
            .map_err(|err| {
                tracing::warn!(
                    agent = %self.key,
                    item = %item.external_id(),
                    error = %err,
                    "engine failed; item left for the next cycle"
                );
            })
            .ok()
    }

    async fn run_engine(
        &self,
        item: &WorkItem,
        kind: EngineKind,
    ) -> Result<EngineOutput, RetryError<EngineError>> {
        let engine = self.agent.engine();
        let processor = engine.as_ref();
        let timeout = self.context.settings().cycle.stage_timeout();
        let seed = format!("{}/{}/{kind}", self.key, item.external_id());
        self.engine_retry
            .execute(&seed, |_| async move {
                tokio::time::timeout(timeout, processor.process(item, kind))
                    .await
                    .unwrap_or(Err(EngineError::Timeout(timeout)))
            })
            .await
            .map(|value| EngineOutput::new(kind, value))
    }

    /// Dispatches then marks. Not raced against stop requests.
    async fn dispatch_and_mark(&self, processed: &ProcessedItem) -> bool {
        let timeout = self.context.settings().cycle.stage_timeout();
        let sink = self.agent.sink();
        match tokio::time::timeout(timeout, sink.dispatch(processed)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(agent = %self.key, item = %processed.external_id(), error = %err, "dispatch failed");
                return false;
            }
            Err(_) => {
                tracing::warn!(agent = %self.key, item = %processed.external_id(), ?timeout, "dispatch timed out");
                return false;
            }
        }

        let record = DedupRecord::new(
            DedupKey::new(self.key.clone(), processed.external_id().clone()),
            self.context.clock().utc(),
        );
        if let Err(err) = self.context.ledger().mark_processed(record).await {
            tracing::error!(
                agent = %self.key,
                item = %processed.external_id(),
                error = %err,
                "item dispatched but not marked; it may be dispatched again"
            );
        }

        let topic = item_processed_topic(self.key.service());
        if let Some(event) = self.context.publish(topic, processed, CYCLE_SOURCE).await
            && let Some(channel) = self.context.live_channel()
            && let Err(err) = channel.notify(self.key.owner(), &event).await
        {
            tracing::warn!(agent = %self.key, error = %err, "live update not delivered");
        }
        true
    }

    async fn publish_cycle(&self, report: &CycleReport, status: LifecycleStatus) {
        let payload = LifecyclePayload::cycle(&self.key, report.cycle_id, report.dispatched.len(), status);
        self.context
            .publish(cycle_completed_topic(self.key.service()), &payload, CYCLE_SOURCE)
            .await;
    }
}
