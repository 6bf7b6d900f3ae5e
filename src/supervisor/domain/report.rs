//! Outcomes of bulk start and stop requests.

use super::{PlanIssue, SupervisorError};
use crate::agent::domain::AgentKey;

/// Outcome of starting a set of instances.
#[derive(Debug, Default)]
pub struct StartReport {
    /// Instances launched, in launch order.
    pub started: Vec<AgentKey>,
    /// Instances that could not be launched.
    pub failed: Vec<(AgentKey, SupervisorError)>,
    /// Instances left out of the start plan.
    pub skipped: Vec<(AgentKey, PlanIssue)>,
}

impl StartReport {
    /// Returns whether every planned instance was launched.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Outcome of stopping a set of instances.
#[derive(Debug, Default)]
pub struct StopReport {
    /// Instances stopped, in stop order.
    pub stopped: Vec<AgentKey>,
    /// Instances that had to be aborted or could not be stopped.
    pub failed: Vec<(AgentKey, SupervisorError)>,
}
