//! Dependency-respecting start order across configured instances.

use crate::agent::domain::{AgentKey, ServiceName};
use crate::graph::{CycleDetected, topological_order};
use crate::registry::AgentRegistry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Why a configured instance was left out of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanIssue {
    /// No descriptor is registered for the service.
    UnknownService,
    /// A declared dependency is not configured, or cannot start, for the
    /// same owner.
    MissingDependency(ServiceName),
}

impl fmt::Display for PlanIssue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownService => formatter.write_str("service is not registered"),
            Self::MissingDependency(service) => {
                write!(formatter, "dependency '{service}' is not configured for this owner")
            }
        }
    }
}

/// Start order for a set of instances.
///
/// Dependencies resolve within one owner: `u1/websocket` depending on
/// `gmail` waits for `u1/gmail`. Instances whose dependencies cannot be
/// satisfied are skipped together with everything that depends on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPlan {
    order: Vec<AgentKey>,
    dependencies: BTreeMap<AgentKey, BTreeSet<AgentKey>>,
    skipped: Vec<(AgentKey, PlanIssue)>,
}

impl StartPlan {
    /// Plans a start of `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`CycleDetected`] with the instances on the cycle when
    /// dependencies are cyclic.
    pub fn build(
        keys: impl IntoIterator<Item = AgentKey>,
        registry: &AgentRegistry,
    ) -> Result<Self, CycleDetected<AgentKey>> {
        let mut skipped = Vec::new();
        let mut graph: BTreeMap<AgentKey, BTreeSet<AgentKey>> = BTreeMap::new();
        for key in keys {
            match registry.descriptor(key.service()) {
                Some(descriptor) => {
                    let dependencies = descriptor
                        .dependency_names()
                        .into_iter()
                        .map(|service| AgentKey::new(key.owner().clone(), service))
                        .collect();
                    graph.insert(key, dependencies);
                }
                None => skipped.push((key, PlanIssue::UnknownService)),
            }
        }

        loop {
            let unsatisfied: Vec<(AgentKey, ServiceName)> = graph
                .iter()
                .filter_map(|(key, dependencies)| {
                    dependencies
                        .iter()
                        .find(|dependency| !graph.contains_key(*dependency))
                        .map(|missing| (key.clone(), missing.service().clone()))
                })
                .collect();
            if unsatisfied.is_empty() {
                break;
            }
            for (key, missing) in unsatisfied {
                graph.remove(&key);
                skipped.push((key, PlanIssue::MissingDependency(missing)));
            }
        }

        let order = topological_order(&graph)?;
        Ok(Self {
            order,
            dependencies: graph,
            skipped,
        })
    }

    /// Returns instances in start order.
    #[must_use]
    pub fn order(&self) -> &[AgentKey] {
        &self.order
    }

    /// Returns the instances `key` must wait for.
    #[must_use]
    pub fn dependencies_of(&self, key: &AgentKey) -> Vec<AgentKey> {
        self.dependencies
            .get(key)
            .map(|dependencies| dependencies.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns instances left out of the plan.
    #[must_use]
    pub fn skipped(&self) -> &[(AgentKey, PlanIssue)] {
        &self.skipped
    }
}
