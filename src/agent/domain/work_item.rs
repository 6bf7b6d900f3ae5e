//! Units of upstream data fetched by an agent cycle.

use super::AgentDomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Provider-defined stable identifier of an upstream item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Creates a validated external identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::EmptyExternalId`] when the trimmed value is
    /// empty.
    pub fn new(value: impl Into<String>) -> Result<Self, AgentDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(AgentDomainError::EmptyExternalId);
        }
        Ok(Self(normalized))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One opaque unit of raw upstream data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    external_id: ExternalId,
    payload: Value,
}

impl WorkItem {
    /// Creates a work item.
    #[must_use]
    pub const fn new(external_id: ExternalId, payload: Value) -> Self {
        Self {
            external_id,
            payload,
        }
    }

    /// Returns the provider identifier.
    #[must_use]
    pub const fn external_id(&self) -> &ExternalId {
        &self.external_id
    }

    /// Returns the raw payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }
}

/// Opaque position in an upstream source, owned by the data-source client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchCursor(String);

impl FetchCursor {
    /// Wraps a provider cursor.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the cursor as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of one fetch call: a bounded batch and the cursor to resume from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchBatch {
    /// Fetched items in provider order.
    pub items: Vec<WorkItem>,
    /// Cursor for the next fetch, or `None` to restart from the head.
    pub next_cursor: Option<FetchCursor>,
}

impl FetchBatch {
    /// Creates a batch.
    #[must_use]
    pub const fn new(items: Vec<WorkItem>, next_cursor: Option<FetchCursor>) -> Self {
        Self { items, next_cursor }
    }
}
