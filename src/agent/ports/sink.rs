//! Result sink port.

use crate::agent::domain::ProcessedItem;
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by sinks. Either way the item is not marked processed and
/// is retried next cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The downstream service was unreachable or overloaded.
    #[error("transient sink failure: {0}")]
    Transient(String),

    /// The downstream service refused the result.
    #[error("sink rejected result: {0}")]
    Rejected(String),
}

/// Delivers processed results downstream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sink: Send + Sync {
    /// Dispatches one processed item.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the downstream call fails.
    async fn dispatch(&self, item: &ProcessedItem) -> Result<(), SinkError>;
}
