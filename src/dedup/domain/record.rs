//! Ledger keys and records.

use crate::agent::domain::{AgentKey, ExternalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one upstream item for one agent: (owner, service, external id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupKey {
    agent: AgentKey,
    external_id: ExternalId,
}

impl DedupKey {
    /// Creates a ledger key.
    #[must_use]
    pub const fn new(agent: AgentKey, external_id: ExternalId) -> Self {
        Self { agent, external_id }
    }

    /// Returns the owning agent.
    #[must_use]
    pub const fn agent(&self) -> &AgentKey {
        &self.agent
    }

    /// Returns the upstream identifier.
    #[must_use]
    pub const fn external_id(&self) -> &ExternalId {
        &self.external_id
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.agent, self.external_id)
    }
}

/// Proof that an item was dispatched. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupRecord {
    key: DedupKey,
    processed_at: DateTime<Utc>,
}

impl DedupRecord {
    /// Creates a record.
    #[must_use]
    pub const fn new(key: DedupKey, processed_at: DateTime<Utc>) -> Self {
        Self { key, processed_at }
    }

    /// Returns the ledger key.
    #[must_use]
    pub const fn key(&self) -> &DedupKey {
        &self.key
    }

    /// Returns when the item was dispatched.
    #[must_use]
    pub const fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }
}
