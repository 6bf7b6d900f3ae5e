//! Capability interface every agent implementation satisfies.

use super::{DataSourceClient, ProcessingEngine, Sink};
use crate::config::domain::AgentConfig;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by an agent hook or factory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AgentHookError {
    message: String,
}

impl AgentHookError {
    /// Creates a hook error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A service-specific agent: lifecycle hooks plus the collaborators its
/// operating cycle drives.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Prepares the agent to run with `config`. Bounded by the hook timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AgentHookError`] when the agent cannot start.
    async fn initialize(&self, config: &AgentConfig) -> Result<(), AgentHookError>;

    /// Releases agent resources. Bounded by the hook timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AgentHookError`] when teardown fails; the instance is then
    /// recorded as failed but its resources are still released.
    async fn stop(&self) -> Result<(), AgentHookError> {
        Ok(())
    }

    /// Returns the data source the cycle fetches from.
    fn source(&self) -> Arc<dyn DataSourceClient>;

    /// Returns the engine the cycle processes items with.
    fn engine(&self) -> Arc<dyn ProcessingEngine>;

    /// Returns the sink the cycle dispatches results to.
    fn sink(&self) -> Arc<dyn Sink>;
}
