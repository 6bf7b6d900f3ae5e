//! Declarative configuration schemas: `{field: {type, required, default}}`.

use super::{AgentConfig, ConfigError, ConfigValues};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved field: milliseconds between cycles.
pub const INTERVAL_MS_FIELD: &str = "interval_ms";
/// Reserved field: maximum items per fetch.
pub const BATCH_SIZE_FIELD: &str = "batch_size";
/// Reserved field: `summarize`, `classify`, or `both`.
pub const PROCESSING_MODE_FIELD: &str = "processing_mode";
/// Reserved field: whether the supervisor should run the instance.
pub const ENABLED_FIELD: &str = "enabled";

const DEFAULT_INTERVAL_MS: u64 = 60_000;
const DEFAULT_BATCH_SIZE: u64 = 10;

/// JSON type a configuration field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// JSON string.
    String,
    /// JSON integer (signed or unsigned).
    Integer,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    List,
    /// JSON object.
    Object,
}

impl FieldType {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Object => "object",
        }
    }

    /// Returns whether `value` has this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Declaration of one configuration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Expected JSON type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must be supplied when no default exists.
    #[serde(default)]
    pub required: bool,
    /// Value used when the field is absent.
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldSpec {
    /// Declares a required field without a default.
    #[must_use]
    pub const fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            default: None,
        }
    }

    /// Declares an optional field that may be absent.
    #[must_use]
    pub const fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default: None,
        }
    }

    /// Declares a field that falls back to `default` when absent.
    #[must_use]
    pub const fn with_default(field_type: FieldType, default: Value) -> Self {
        Self {
            field_type,
            required: false,
            default: Some(default),
        }
    }
}

/// Agent-specific configuration schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl ConfigSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field declaration.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Returns the declaration of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Returns all declared fields in name order.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, FieldSpec> {
        &self.fields
    }

    /// Returns this schema merged with the fields every agent accepts.
    ///
    /// Agent declarations of a reserved field override the runtime default.
    #[must_use]
    pub fn with_runtime_fields(&self) -> Self {
        let mut merged = Self::runtime_fields();
        merged.fields.extend(
            self.fields
                .iter()
                .map(|(name, spec)| (name.clone(), spec.clone())),
        );
        merged
    }

    fn runtime_fields() -> Self {
        Self::new()
            .field(
                INTERVAL_MS_FIELD,
                FieldSpec::with_default(FieldType::Integer, json!(DEFAULT_INTERVAL_MS)),
            )
            .field(
                BATCH_SIZE_FIELD,
                FieldSpec::with_default(FieldType::Integer, json!(DEFAULT_BATCH_SIZE)),
            )
            .field(
                PROCESSING_MODE_FIELD,
                FieldSpec::with_default(FieldType::String, json!("classify")),
            )
            .field(
                ENABLED_FIELD,
                FieldSpec::with_default(FieldType::Boolean, json!(true)),
            )
    }

    /// Validates `values` against this schema merged with the runtime
    /// fields, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unknown fields, missing required fields,
    /// type mismatches, or invalid reserved-field values.
    pub fn resolve(&self, values: &ConfigValues) -> Result<AgentConfig, ConfigError> {
        let schema = self.with_runtime_fields();

        if let Some(unknown) = values.keys().find(|name| schema.get(name).is_none()) {
            return Err(ConfigError::UnknownField(unknown.to_owned()));
        }

        let mut resolved = BTreeMap::new();
        for (name, spec) in &schema.fields {
            let value = match (values.get(name), &spec.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) if spec.required => {
                    return Err(ConfigError::MissingField(name.clone()));
                }
                (None, None) => continue,
            };
            if !spec.field_type.matches(&value) {
                return Err(ConfigError::TypeMismatch {
                    field: name.clone(),
                    expected: spec.field_type,
                });
            }
            resolved.insert(name.clone(), value);
        }

        AgentConfig::from_resolved(resolved)
    }
}
