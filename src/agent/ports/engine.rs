//! Processing engine port.

use crate::agent::domain::{EngineKind, WorkItem};
use crate::resilience::Retryable;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by processing engines.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine may succeed on another attempt.
    #[error("transient engine failure: {0}")]
    Transient(String),

    /// The engine refused the item.
    #[error("engine rejected item: {0}")]
    Rejected(String),

    /// The call exceeded the stage timeout.
    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),
}

impl Retryable for EngineError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

/// Summarizes or classifies one work item.
#[async_trait]
pub trait ProcessingEngine: Send + Sync {
    /// Runs the `kind` stage over `item` and returns an engine-specific
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when processing fails.
    async fn process(&self, item: &WorkItem, kind: EngineKind) -> Result<Value, EngineError>;
}
