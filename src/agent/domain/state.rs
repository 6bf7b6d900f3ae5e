//! Agent lifecycle state machine.

use super::ParseAgentStateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an agent instance.
///
/// ```text
/// Created -> Initializing -> Running <-> Paused -> Stopping -> Stopped
/// ```
///
/// `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Instance exists but has not been started.
    Created,
    /// The agent-specific initialize hook is running.
    Initializing,
    /// The operating cycle is active.
    Running,
    /// The loop is parked between cycles awaiting resume.
    Paused,
    /// The agent-specific stop hook is running.
    Stopping,
    /// Resources have been released.
    Stopped,
    /// A hook or the run-loop failed beyond its retry budget.
    Failed,
}

impl AgentState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Returns whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Returns whether the instance holds live resources.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::Running | Self::Paused | Self::Stopping
        )
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Initializing)
                | (Self::Initializing, Self::Running | Self::Stopping)
                | (Self::Running, Self::Paused | Self::Stopping)
                | (Self::Paused, Self::Running | Self::Stopping)
                | (Self::Stopping, Self::Stopped)
                | (
                    Self::Created
                        | Self::Initializing
                        | Self::Running
                        | Self::Paused
                        | Self::Stopping,
                    Self::Failed
                )
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AgentState {
    type Error = ParseAgentStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "created" => Ok(Self::Created),
            "initializing" => Ok(Self::Initializing),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseAgentStateError(value.to_owned())),
        }
    }
}

/// Coarse health derived from lifecycle state and failure history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentHealth {
    /// Running or paused without recorded failures.
    Healthy,
    /// Live, but restarted or erroring recently.
    Degraded,
    /// Failed.
    Unhealthy,
    /// Not yet started or already stopped.
    Unknown,
}

impl AgentHealth {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AgentHealth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
