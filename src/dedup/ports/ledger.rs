//! Dedup ledger port.

use crate::agent::domain::AgentKey;
use crate::dedup::domain::{DedupKey, DedupRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for dedup ledger operations.
pub type DedupResult<T> = Result<T, DedupError>;

/// Records which upstream items each agent has already dispatched.
///
/// Implementations must lock per agent, never globally, and must make
/// [`DedupLedger::mark_processed`] atomic per key.
#[async_trait]
pub trait DedupLedger: Send + Sync {
    /// Returns whether `key` has no record yet.
    async fn should_process(&self, key: &DedupKey) -> DedupResult<bool>;

    /// Writes `record` unless its key is already present.
    ///
    /// Returns `true` when the record was inserted. Concurrent calls for the
    /// same key insert exactly one record; the first write wins and later
    /// calls are no-ops.
    async fn mark_processed(&self, record: DedupRecord) -> DedupResult<bool>;

    /// Returns the record for `key`.
    async fn find(&self, key: &DedupKey) -> DedupResult<Option<DedupRecord>>;

    /// Returns every record belonging to `agent`.
    async fn records_for(&self, agent: &AgentKey) -> DedupResult<Vec<DedupRecord>>;

    /// Removes records processed before `cutoff`, returning how many were
    /// removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> DedupResult<usize>;
}

/// Errors returned by dedup ledger implementations.
#[derive(Debug, Clone, Error)]
pub enum DedupError {
    /// Persistence-layer failure.
    #[error("dedup ledger persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl DedupError {
    /// Wraps a persistence error.
    #[must_use]
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
