//! Configuration provider port.

use crate::agent::domain::{AgentKey, OwnerId, ServiceName};
use crate::config::domain::{AgentConfig, ConfigError, ConfigValues};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for configuration provider operations.
pub type ConfigProviderResult<T> = Result<T, ConfigProviderError>;

/// Resolves and stores schema-validated per-agent configuration.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Returns the configuration for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigProviderError::NotFound`] when nothing is stored.
    async fn get(&self, key: &AgentKey) -> ConfigProviderResult<AgentConfig>;

    /// Validates `values` against the service schema and stores the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigProviderError::Validation`] when the document does not
    /// satisfy the schema and [`ConfigProviderError::UnknownService`] when no
    /// schema is registered for the service.
    async fn put(&self, key: &AgentKey, values: ConfigValues)
    -> ConfigProviderResult<AgentConfig>;

    /// Removes the configuration for `key`, returning whether it existed.
    async fn remove(&self, key: &AgentKey) -> ConfigProviderResult<bool>;

    /// Returns every enabled (owner, service) configuration.
    async fn list_enabled(&self) -> ConfigProviderResult<Vec<(AgentKey, AgentConfig)>>;

    /// Returns every configuration belonging to `owner`.
    async fn list_for_owner(
        &self,
        owner: &OwnerId,
    ) -> ConfigProviderResult<Vec<(AgentKey, AgentConfig)>>;
}

/// Errors returned by configuration providers.
#[derive(Debug, Clone, Error)]
pub enum ConfigProviderError {
    /// No configuration is stored for the key.
    #[error("no configuration stored for {0}")]
    NotFound(AgentKey),

    /// No schema is registered for the service.
    #[error("no configuration schema registered for service '{0}'")]
    UnknownService(ServiceName),

    /// The document failed schema validation.
    #[error(transparent)]
    Validation(#[from] ConfigError),

    /// Persistence-layer failure.
    #[error("configuration persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ConfigProviderError {
    /// Wraps a persistence error.
    #[must_use]
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
