//! Raw configuration documents and resolved agent configuration.

use super::schema::{
    BATCH_SIZE_FIELD, ENABLED_FIELD, INTERVAL_MS_FIELD, PROCESSING_MODE_FIELD,
};
use super::ConfigError;
use crate::agent::domain::ProcessingMode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

/// Unvalidated per-agent configuration as submitted by an operator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigValues(BTreeMap<String, Value>);

impl ConfigValues {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a JSON object into a document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotAnObject`] when `document` is not an object.
    pub fn from_json(document: Value) -> Result<Self, ConfigError> {
        match document {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    /// Sets `name` to `value`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Returns the value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Iterates over field names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Schema-validated configuration snapshot for one agent instance.
///
/// Reserved runtime fields are parsed eagerly so accessors cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    values: BTreeMap<String, Value>,
    interval: Duration,
    batch_size: usize,
    processing_mode: ProcessingMode,
    enabled: bool,
}

impl AgentConfig {
    pub(super) fn from_resolved(values: BTreeMap<String, Value>) -> Result<Self, ConfigError> {
        let interval_ms = positive_integer(&values, INTERVAL_MS_FIELD)?;
        let batch_size = usize::try_from(positive_integer(&values, BATCH_SIZE_FIELD)?)
            .map_err(|err| invalid(BATCH_SIZE_FIELD, err.to_string()))?;
        let processing_mode = values
            .get(PROCESSING_MODE_FIELD)
            .and_then(Value::as_str)
            .map(ProcessingMode::try_from)
            .transpose()
            .map_err(|err| invalid(PROCESSING_MODE_FIELD, err.to_string()))?
            .unwrap_or_default();
        let enabled = values
            .get(ENABLED_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(true);

        Ok(Self {
            values,
            interval: Duration::from_millis(interval_ms),
            batch_size,
            processing_mode,
            enabled,
        })
    }

    /// Returns the delay between cycles.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the maximum number of items per fetch.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns which engines each item is routed through.
    #[must_use]
    pub const fn processing_mode(&self) -> ProcessingMode {
        self.processing_mode
    }

    /// Returns whether the supervisor should run the instance.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the resolved value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns `name` as a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns `name` as a signed integer.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Returns `name` as a boolean.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Returns the resolved document, including defaults.
    #[must_use]
    pub fn to_values(&self) -> ConfigValues {
        ConfigValues(self.values.clone())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let interval = Duration::from_secs(60);
        let batch_size = 10;
        let processing_mode = ProcessingMode::default();
        let values = BTreeMap::from([
            (INTERVAL_MS_FIELD.to_owned(), json!(60_000)),
            (BATCH_SIZE_FIELD.to_owned(), json!(batch_size)),
            (
                PROCESSING_MODE_FIELD.to_owned(),
                json!(processing_mode.as_str()),
            ),
            (ENABLED_FIELD.to_owned(), json!(true)),
        ]);
        Self {
            values,
            interval,
            batch_size,
            processing_mode,
            enabled: true,
        }
    }
}

fn positive_integer(values: &BTreeMap<String, Value>, field: &str) -> Result<u64, ConfigError> {
    match values.get(field).and_then(Value::as_u64) {
        Some(0) | None => Err(invalid(field, "must be a positive integer")),
        Some(value) => Ok(value),
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
}
