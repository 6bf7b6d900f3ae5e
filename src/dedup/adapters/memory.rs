//! In-memory dedup ledger partitioned per agent.

use crate::agent::domain::{AgentKey, ExternalId};
use crate::dedup::{
    domain::{DedupKey, DedupRecord},
    ports::{DedupError, DedupLedger, DedupResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

type Partition = Arc<Mutex<HashMap<ExternalId, DedupRecord>>>;

/// Thread-safe in-memory ledger.
///
/// Each (owner, service) pair has its own partition lock; the outer map is
/// only write-locked to create a partition.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDedupLedger {
    partitions: Arc<RwLock<HashMap<AgentKey, Partition>>>,
}

impl InMemoryDedupLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_partition(&self, agent: &AgentKey) -> DedupResult<Option<Partition>> {
        let partitions = self.partitions.read().map_err(poisoned)?;
        Ok(partitions.get(agent).map(Arc::clone))
    }

    fn partition(&self, agent: &AgentKey) -> DedupResult<Partition> {
        if let Some(partition) = self.existing_partition(agent)? {
            return Ok(partition);
        }
        let mut partitions = self.partitions.write().map_err(poisoned)?;
        Ok(Arc::clone(partitions.entry(agent.clone()).or_default()))
    }

    fn all_partitions(&self) -> DedupResult<Vec<Partition>> {
        let partitions = self.partitions.read().map_err(poisoned)?;
        Ok(partitions.values().map(Arc::clone).collect())
    }
}

fn poisoned(err: impl std::fmt::Display) -> DedupError {
    DedupError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl DedupLedger for InMemoryDedupLedger {
    async fn should_process(&self, key: &DedupKey) -> DedupResult<bool> {
        Ok(self.find(key).await?.is_none())
    }

    async fn mark_processed(&self, record: DedupRecord) -> DedupResult<bool> {
        let partition = self.partition(record.key().agent())?;
        let mut records = partition.lock().map_err(poisoned)?;
        let external_id = record.key().external_id().clone();
        if records.contains_key(&external_id) {
            return Ok(false);
        }
        records.insert(external_id, record);
        Ok(true)
    }

    async fn find(&self, key: &DedupKey) -> DedupResult<Option<DedupRecord>> {
        let Some(partition) = self.existing_partition(key.agent())? else {
            return Ok(None);
        };
        let records = partition.lock().map_err(poisoned)?;
        Ok(records.get(key.external_id()).cloned())
    }

    async fn records_for(&self, agent: &AgentKey) -> DedupResult<Vec<DedupRecord>> {
        let Some(partition) = self.existing_partition(agent)? else {
            return Ok(Vec::new());
        };
        let records = partition.lock().map_err(poisoned)?;
        let mut listed: Vec<DedupRecord> = records.values().cloned().collect();
        listed.sort_by(|left, right| left.key().cmp(right.key()));
        Ok(listed)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> DedupResult<usize> {
        let mut removed = 0_usize;
        for partition in self.all_partitions()? {
            let mut records = partition.lock().map_err(poisoned)?;
            let before = records.len();
            records.retain(|_, record| record.processed_at() >= cutoff);
            removed = removed.saturating_add(before.saturating_sub(records.len()));
        }
        Ok(removed)
    }
}
