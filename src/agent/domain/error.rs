//! Error types for agent domain validation and parsing.

use super::AgentState;
use thiserror::Error;

/// Errors returned while constructing agent domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentDomainError {
    /// The owner identifier is empty after trimming.
    #[error("owner identifier must not be empty")]
    EmptyOwnerId,

    /// The owner identifier exceeds the storage limit.
    #[error("owner identifier exceeds 128 character limit: {0}")]
    OwnerIdTooLong(String),

    /// The service name is empty after trimming.
    #[error("service name must not be empty")]
    EmptyServiceName,

    /// The service name contains characters outside `[a-z0-9_]`.
    #[error(
        "service name '{0}' contains invalid characters (only lowercase alphanumeric and underscores allowed)"
    )]
    InvalidServiceName(String),

    /// The service name exceeds the 64-character limit.
    #[error("service name exceeds 64 character limit: {0}")]
    ServiceNameTooLong(String),

    /// A work item arrived without a provider identifier.
    #[error("work item external identifier must not be empty")]
    EmptyExternalId,

    /// A version string is not `major.minor.patch`.
    #[error("invalid agent version '{0}', expected major.minor.patch")]
    InvalidVersion(String),

    /// A processing mode string is not recognised.
    #[error("unknown processing mode '{0}', expected summarize, classify, or both")]
    InvalidProcessingMode(String),

    /// Transitioning between two lifecycle states is invalid.
    #[error("invalid agent lifecycle transition: {from} -> {to}")]
    InvalidLifecycleTransition {
        /// Current lifecycle state.
        from: AgentState,
        /// Requested target lifecycle state.
        to: AgentState,
    },
}

/// Error returned while parsing agent states from persistence or requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown agent lifecycle state: {0}")]
pub struct ParseAgentStateError(pub String);
