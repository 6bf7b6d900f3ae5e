//! Ownership of live agent instances.
//!
//! The [`services::Supervisor`] resolves configuration, asks the registry
//! for agents, starts them in dependency order, and keeps them alive within
//! a bounded restart policy. Each health pass publishes
//! `supervisor.health.tick`; instances beyond the restart ceiling are
//! reported on `agent.failed`.

pub mod domain;
pub mod services;

pub use domain::{
    HealthReport, PlanIssue, RestartDecision, RestartPolicy, StartPlan, StartReport, StopReport,
    SupervisorError, SupervisorResult,
};
pub use services::Supervisor;

#[cfg(test)]
mod tests;
