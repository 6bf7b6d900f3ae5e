//! Constructor contract for agent implementations.

use crate::agent::{
    domain::AgentKey,
    ports::{Agent, AgentHookError},
};
use crate::config::domain::AgentConfig;
use std::sync::Arc;

/// Builds an agent for one (owner, service) pair from its resolved
/// configuration.
///
/// Any `Fn(&AgentKey, &AgentConfig) -> Result<Arc<dyn Agent>, AgentHookError>`
/// closure is a factory.
pub trait AgentFactory: Send + Sync {
    /// Creates a fresh agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentHookError`] when the agent cannot be constructed.
    fn create(&self, key: &AgentKey, config: &AgentConfig) -> Result<Arc<dyn Agent>, AgentHookError>;
}

impl<F> AgentFactory for F
where
    F: Fn(&AgentKey, &AgentConfig) -> Result<Arc<dyn Agent>, AgentHookError> + Send + Sync,
{
    fn create(&self, key: &AgentKey, config: &AgentConfig) -> Result<Arc<dyn Agent>, AgentHookError> {
        self(key, config)
    }
}
