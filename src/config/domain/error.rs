//! Configuration validation errors.

use super::FieldType;
use thiserror::Error;

/// Errors raised while validating per-agent configuration against a schema.
///
/// A configuration error fails fast: an instance whose configuration does
/// not validate is never started.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The document contains a field the schema does not declare.
    #[error("unknown configuration field '{0}'")]
    UnknownField(String),

    /// A required field without a default is absent.
    #[error("missing required configuration field '{0}'")]
    MissingField(String),

    /// A field value does not have the declared type.
    #[error("configuration field '{field}' must be of type {expected}")]
    TypeMismatch {
        /// Offending field.
        field: String,
        /// Declared type.
        expected: FieldType,
    },

    /// A field has the right type but an unacceptable value.
    #[error("configuration field '{field}' is invalid: {reason}")]
    InvalidValue {
        /// Offending field.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The configuration document is not a JSON object.
    #[error("configuration must be a JSON object")]
    NotAnObject,
}
