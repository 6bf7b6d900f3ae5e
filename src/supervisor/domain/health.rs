//! Outcome of one supervisor health pass.

use crate::agent::domain::AgentKey;
use serde::Serialize;

/// Instances inspected and acted upon during a health pass. Published as
/// the payload of `supervisor.health.tick`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Instances inspected.
    pub checked: usize,
    /// Running instances that made no progress within the liveness window.
    pub wedged: Vec<AgentKey>,
    /// Instances replaced by a fresh instance.
    pub restarted: Vec<AgentKey>,
    /// Instances left failed and reported on `agent.failed`.
    pub failed: Vec<AgentKey>,
}
