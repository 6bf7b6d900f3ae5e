//! Domain model for per-agent configuration and runtime settings.
//!
//! Per-agent configuration is validated against a declarative schema before
//! an instance may start. Runtime settings govern the supervisor, retry,
//! rate-limit, cycle, and event-bus behaviour of the whole process.

mod error;
mod schema;
mod settings;
mod values;

pub use error::ConfigError;
pub use schema::{
    BATCH_SIZE_FIELD, ConfigSchema, ENABLED_FIELD, FieldSpec, FieldType, INTERVAL_MS_FIELD,
    PROCESSING_MODE_FIELD,
};
pub use settings::{
    BucketSettings, CycleSettings, EventBusSettings, RateLimitSettings, RestartSettings,
    RetrySettings, RuntimeSettings, SettingsError, SupervisorSettings,
};
pub use values::{AgentConfig, ConfigValues};
