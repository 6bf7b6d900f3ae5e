//! Data source port implemented by agent-specific code.

use crate::agent::domain::{FetchBatch, FetchCursor};
use crate::resilience::Retryable;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by data source clients.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The owner has not completed authentication with the external service.
    #[error("owner is not authenticated with the data source")]
    NotAuthenticated,

    /// A network or upstream failure that may clear on retry.
    #[error("transient data source failure: {0}")]
    Transient(String),

    /// The upstream service or the local limiter throttled the call.
    #[error("data source rate limited; retry after {retry_after:?}")]
    RateLimited {
        /// Hint for when the next call may succeed.
        retry_after: Duration,
    },

    /// A failure that will not clear on retry.
    #[error("data source failure: {0}")]
    Fatal(Arc<dyn std::error::Error + Send + Sync>),
}

impl SourceError {
    /// Wraps a non-retryable client error.
    pub fn fatal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Fatal(Arc::new(err))
    }
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }
}

/// Fetches raw work items for one (owner, service) pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataSourceClient: Send + Sync {
    /// Fetches at most `batch_size` items after `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the upstream call fails.
    async fn fetch(
        &self,
        cursor: Option<FetchCursor>,
        batch_size: usize,
    ) -> Result<FetchBatch, SourceError>;

    /// Returns whether the owner's credentials are usable.
    async fn is_authenticated(&self) -> bool;
}
