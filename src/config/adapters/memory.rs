//! In-memory configuration provider.

use crate::agent::domain::{AgentKey, OwnerId, ServiceName};
use crate::config::{
    domain::{AgentConfig, ConfigSchema, ConfigValues},
    ports::{ConfigProvider, ConfigProviderError, ConfigProviderResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory configuration store validating against a fixed
/// schema catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigProvider {
    schemas: Arc<BTreeMap<ServiceName, ConfigSchema>>,
    state: Arc<RwLock<BTreeMap<AgentKey, AgentConfig>>>,
}

impl InMemoryConfigProvider {
    /// Creates an empty store validating against `schemas`.
    #[must_use]
    pub fn new(schemas: BTreeMap<ServiceName, ConfigSchema>) -> Self {
        Self {
            schemas: Arc::new(schemas),
            state: Arc::default(),
        }
    }

    fn read_state(
        &self,
    ) -> ConfigProviderResult<std::sync::RwLockReadGuard<'_, BTreeMap<AgentKey, AgentConfig>>> {
        self.state
            .read()
            .map_err(|err| ConfigProviderError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write_state(
        &self,
    ) -> ConfigProviderResult<std::sync::RwLockWriteGuard<'_, BTreeMap<AgentKey, AgentConfig>>>
    {
        self.state
            .write()
            .map_err(|err| ConfigProviderError::persistence(std::io::Error::other(err.to_string())))
    }

    fn collect(
        &self,
        predicate: impl Fn(&AgentKey, &AgentConfig) -> bool,
    ) -> ConfigProviderResult<Vec<(AgentKey, AgentConfig)>> {
        let state = self.read_state()?;
        Ok(state
            .iter()
            .filter(|(key, config)| predicate(key, config))
            .map(|(key, config)| (key.clone(), config.clone()))
            .collect())
    }
}

#[async_trait]
impl ConfigProvider for InMemoryConfigProvider {
    async fn get(&self, key: &AgentKey) -> ConfigProviderResult<AgentConfig> {
        self.read_state()?
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigProviderError::NotFound(key.clone()))
    }

    async fn put(
        &self,
        key: &AgentKey,
        values: ConfigValues,
    ) -> ConfigProviderResult<AgentConfig> {
        let schema = self
            .schemas
            .get(key.service())
            .ok_or_else(|| ConfigProviderError::UnknownService(key.service().clone()))?;
        let config = schema.resolve(&values)?;
        self.write_state()?.insert(key.clone(), config.clone());
        Ok(config)
    }

    async fn remove(&self, key: &AgentKey) -> ConfigProviderResult<bool> {
        Ok(self.write_state()?.remove(key).is_some())
    }

    async fn list_enabled(&self) -> ConfigProviderResult<Vec<(AgentKey, AgentConfig)>> {
        self.collect(|_, config| config.enabled())
    }

    async fn list_for_owner(
        &self,
        owner: &OwnerId,
    ) -> ConfigProviderResult<Vec<(AgentKey, AgentConfig)>> {
        self.collect(|key, _| key.owner() == owner)
    }
}
