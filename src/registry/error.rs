//! Registry errors.

use crate::agent::domain::{AgentVersion, ServiceName};
use crate::agent::ports::AgentHookError;
use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while building the registry or constructing agents.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A descriptor for the service was already registered.
    #[error("service '{0}' is already registered")]
    DuplicateService(ServiceName),

    /// No descriptor is registered for the service.
    #[error("service '{0}' is not registered")]
    UnknownService(ServiceName),

    /// A declared dependency has no descriptor.
    #[error("service '{service}' depends on unregistered service '{dependency}'")]
    MissingDependency {
        /// Declaring service.
        service: ServiceName,
        /// Missing dependency.
        dependency: ServiceName,
    },

    /// A dependency's version does not satisfy the declared minimum.
    #[error(
        "service '{service}' requires '{dependency}' {required} or a compatible later version, found {found}"
    )]
    IncompatibleDependency {
        /// Declaring service.
        service: ServiceName,
        /// Dependency service.
        dependency: ServiceName,
        /// Declared minimum version.
        required: AgentVersion,
        /// Registered version.
        found: AgentVersion,
    },

    /// Service dependencies form a cycle.
    #[error("service dependencies form a cycle: {0:?}")]
    DependencyCycle(Vec<ServiceName>),

    /// The factory refused to construct an agent.
    #[error("factory for '{service}' failed: {source}")]
    Factory {
        /// Service whose factory failed.
        service: ServiceName,
        /// Factory failure.
        source: AgentHookError,
    },
}
