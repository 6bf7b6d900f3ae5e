//! Supervisor errors.

use crate::agent::domain::{AgentKey, AgentState};
use crate::config::ports::ConfigProviderError;
use crate::registry::RegistryError;
use thiserror::Error;

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Errors returned by supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Configuration could not be read or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigProviderError),

    /// The registry could not construct the agent.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The instance's configuration disables it.
    #[error("agent {0} is disabled by configuration")]
    Disabled(AgentKey),

    /// The instance already has a live run-loop.
    #[error("agent {0} is already active")]
    AlreadyActive(AgentKey),

    /// The supervisor holds no instance for the key.
    #[error("agent {0} is not managed by this supervisor")]
    NotFound(AgentKey),

    /// The operation does not apply in the instance's current state.
    #[error("cannot {operation} agent {key} while {state}")]
    InvalidState {
        /// Target instance.
        key: AgentKey,
        /// State at the time of the request.
        state: AgentState,
        /// Requested operation.
        operation: &'static str,
    },

    /// A declared dependency has not reached `Running`.
    #[error("agent {key} depends on {dependency}, which is not running")]
    DependencyNotRunning {
        /// Instance being started.
        key: AgentKey,
        /// Dependency that is not running.
        dependency: AgentKey,
    },

    /// Instance dependencies form a cycle.
    #[error("agent dependencies form a cycle: {0:?}")]
    DependencyCycle(Vec<AgentKey>),

    /// The run-loop did not stop within the grace period and was aborted.
    #[error("agent {0} did not stop within the grace period")]
    Wedged(AgentKey),
}
