//! Immutable description of an agent implementation.

use super::{AgentVersion, ServiceName};
use crate::config::domain::ConfigSchema;
use std::collections::{BTreeMap, BTreeSet};

/// Static metadata registered once per service at process start.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDescriptor {
    service: ServiceName,
    version: AgentVersion,
    dependencies: BTreeMap<ServiceName, AgentVersion>,
    config_schema: ConfigSchema,
}

impl AgentDescriptor {
    /// Creates a descriptor with no dependencies and an empty schema.
    #[must_use]
    pub fn new(service: ServiceName, version: AgentVersion) -> Self {
        Self {
            service,
            version,
            dependencies: BTreeMap::new(),
            config_schema: ConfigSchema::default(),
        }
    }

    /// Declares a dependency on `service` at `minimum` or a later compatible
    /// version.
    #[must_use]
    pub fn with_dependency(mut self, service: ServiceName, minimum: AgentVersion) -> Self {
        self.dependencies.insert(service, minimum);
        self
    }

    /// Sets the agent-specific configuration schema.
    #[must_use]
    pub fn with_config_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = schema;
        self
    }

    /// Returns the service this descriptor implements.
    #[must_use]
    pub const fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Returns the implementation version.
    #[must_use]
    pub const fn version(&self) -> AgentVersion {
        self.version
    }

    /// Returns declared dependencies with their minimum versions.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeMap<ServiceName, AgentVersion> {
        &self.dependencies
    }

    /// Returns the names of declared dependencies.
    #[must_use]
    pub fn dependency_names(&self) -> BTreeSet<ServiceName> {
        self.dependencies.keys().cloned().collect()
    }

    /// Returns the agent-specific configuration schema.
    #[must_use]
    pub const fn config_schema(&self) -> &ConfigSchema {
        &self.config_schema
    }
}
