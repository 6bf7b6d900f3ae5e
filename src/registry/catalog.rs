//! Registry builder (warm-up) and the immutable registry it produces.

use super::{AgentFactory, RegistryError, RegistryResult};
use crate::agent::{
    domain::{AgentDescriptor, AgentKey, ServiceName},
    ports::Agent,
};
use crate::config::domain::{AgentConfig, ConfigSchema};
use crate::graph::{CycleDetected, topological_order};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

struct Registration {
    descriptor: AgentDescriptor,
    factory: Arc<dyn AgentFactory>,
}

/// Collects descriptors and factories at process start.
#[derive(Default)]
pub struct AgentRegistryBuilder {
    registrations: BTreeMap<ServiceName, Registration>,
}

impl AgentRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for `descriptor`'s service.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateService`] when the service is
    /// already registered.
    pub fn register(
        mut self,
        descriptor: AgentDescriptor,
        factory: impl AgentFactory + 'static,
    ) -> RegistryResult<Self> {
        let service = descriptor.service().clone();
        if self.registrations.contains_key(&service) {
            return Err(RegistryError::DuplicateService(service));
        }
        self.registrations.insert(
            service,
            Registration {
                descriptor,
                factory: Arc::new(factory),
            },
        );
        Ok(self)
    }

    /// Validates dependencies and freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MissingDependency`],
    /// [`RegistryError::IncompatibleDependency`], or
    /// [`RegistryError::DependencyCycle`] when declared dependencies cannot
    /// be satisfied.
    pub fn build(self) -> RegistryResult<AgentRegistry> {
        for registration in self.registrations.values() {
            let descriptor = &registration.descriptor;
            for (dependency, required) in descriptor.dependencies() {
                let found = self
                    .registrations
                    .get(dependency)
                    .ok_or_else(|| RegistryError::MissingDependency {
                        service: descriptor.service().clone(),
                        dependency: dependency.clone(),
                    })?
                    .descriptor
                    .version();
                if !found.is_compatible_with(*required) {
                    return Err(RegistryError::IncompatibleDependency {
                        service: descriptor.service().clone(),
                        dependency: dependency.clone(),
                        required: *required,
                        found,
                    });
                }
            }
        }

        let graph: BTreeMap<ServiceName, BTreeSet<ServiceName>> = self
            .registrations
            .iter()
            .map(|(service, registration)| (service.clone(), registration.descriptor.dependency_names()))
            .collect();
        let start_order = topological_order(&graph)
            .map_err(|CycleDetected(cycle)| RegistryError::DependencyCycle(cycle))?;

        tracing::info!(services = start_order.len(), "agent registry built");
        Ok(AgentRegistry {
            registrations: self.registrations,
            start_order,
        })
    }
}

/// Immutable map from service name to descriptor and factory.
pub struct AgentRegistry {
    registrations: BTreeMap<ServiceName, Registration>,
    start_order: Vec<ServiceName>,
}

impl AgentRegistry {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::new()
    }

    /// Returns the descriptor for `service`.
    #[must_use]
    pub fn descriptor(&self, service: &ServiceName) -> Option<&AgentDescriptor> {
        self.registrations
            .get(service)
            .map(|registration| &registration.descriptor)
    }

    /// Returns registered services, dependencies first.
    #[must_use]
    pub fn start_order(&self) -> &[ServiceName] {
        &self.start_order
    }

    /// Returns each service's schema merged with runtime-reserved fields,
    /// ready for a configuration provider.
    #[must_use]
    pub fn schema_catalog(&self) -> BTreeMap<ServiceName, ConfigSchema> {
        self.registrations
            .iter()
            .map(|(service, registration)| {
                (
                    service.clone(),
                    registration.descriptor.config_schema().with_runtime_fields(),
                )
            })
            .collect()
    }

    /// Constructs a fresh agent for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownService`] when no factory is
    /// registered for the service, or [`RegistryError::Factory`] when the
    /// factory fails.
    pub fn create(&self, key: &AgentKey, config: &AgentConfig) -> RegistryResult<Arc<dyn Agent>> {
        let registration = self
            .registrations
            .get(key.service())
            .ok_or_else(|| RegistryError::UnknownService(key.service().clone()))?;
        registration
            .factory
            .create(key, config)
            .map_err(|source| RegistryError::Factory {
                service: key.service().clone(),
                source,
            })
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AgentRegistry")
            .field("start_order", &self.start_order)
            .finish_non_exhaustive()
    }
}
