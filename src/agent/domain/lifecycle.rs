//! Lifecycle event payloads and topic names published by agents.

use super::{AgentKey, CycleId, ServiceName};
use crate::event_bus::domain::Topic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle milestones published on `<service>.agent.<verb>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleVerb {
    /// Initialize hook succeeded.
    Started,
    /// Stop hook completed.
    Stopped,
    /// Loop parked between cycles.
    Paused,
    /// Loop resumed.
    Resumed,
}

impl LifecycleVerb {
    /// Returns the topic verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
        }
    }

    /// Returns the topic for `service`.
    #[must_use]
    pub fn topic(self, service: &ServiceName) -> Topic {
        Topic::service_scoped(service, "agent", self.as_str())
    }
}

/// Returns `<service>.cycle.completed`.
#[must_use]
pub fn cycle_completed_topic(service: &ServiceName) -> Topic {
    Topic::service_scoped(service, "cycle", "completed")
}

/// Returns `<service>.item.processed`.
#[must_use]
pub fn item_processed_topic(service: &ServiceName) -> Topic {
    Topic::service_scoped(service, "item", "processed")
}

/// Outcome reported in lifecycle payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Lifecycle milestone reached without a cycle.
    Ok,
    /// Every fetched item was dispatched or filtered.
    Completed,
    /// At least one item was left for the next cycle.
    Partial,
    /// The fetch stage failed; nothing was processed.
    FetchFailed,
}

impl LifecycleStatus {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::FetchFailed => "fetch_failed",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Payload of every lifecycle event: `{ownerId, serviceName, cycleId,
/// itemCount, status}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecyclePayload {
    /// Owning user.
    pub owner_id: String,
    /// External service.
    pub service_name: String,
    /// Cycle the event belongs to, absent for pure lifecycle milestones.
    pub cycle_id: Option<CycleId>,
    /// Items dispatched in the cycle.
    pub item_count: usize,
    /// Outcome.
    pub status: LifecycleStatus,
}

impl LifecyclePayload {
    /// Creates a payload for a lifecycle milestone.
    #[must_use]
    pub fn milestone(key: &AgentKey) -> Self {
        Self {
            owner_id: key.owner().as_str().to_owned(),
            service_name: key.service().as_str().to_owned(),
            cycle_id: None,
            item_count: 0,
            status: LifecycleStatus::Ok,
        }
    }

    /// Creates a payload for a completed cycle.
    #[must_use]
    pub fn cycle(
        key: &AgentKey,
        cycle_id: CycleId,
        item_count: usize,
        status: LifecycleStatus,
    ) -> Self {
        Self {
            cycle_id: Some(cycle_id),
            item_count,
            status,
            ..Self::milestone(key)
        }
    }
}
