//! Error types for event bus domain validation.

use thiserror::Error;

/// Errors returned while constructing event bus domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventDomainError {
    /// The topic is empty after trimming.
    #[error("event topic must not be empty")]
    EmptyTopic,

    /// The topic contains characters outside `[a-z0-9_.-]` or an empty
    /// segment.
    #[error(
        "event topic '{0}' is invalid (lowercase alphanumeric, '_', '-' segments separated by '.')"
    )]
    InvalidTopic(String),
}
