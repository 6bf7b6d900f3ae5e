//! Agent instance aggregate root.

use super::{AgentDomainError, AgentHealth, AgentKey, AgentState, AgentVersion};
use crate::config::domain::AgentConfig;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a recorded agent failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Configuration failed schema validation.
    Config,
    /// The initialize hook failed or timed out.
    Initialize,
    /// The data source reported the owner is not authenticated.
    Authentication,
    /// Fetching from the data source failed after retries.
    Source,
    /// Dispatching to a sink failed.
    Sink,
    /// The dedup ledger could not be read or written.
    Ledger,
    /// The stop hook failed or timed out.
    StopHook,
    /// The supervisor detected no progress within the liveness window.
    Wedged,
    /// The restart ceiling was exceeded.
    RestartCeiling,
}

impl FailureKind {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Initialize => "initialize",
            Self::Authentication => "authentication",
            Self::Source => "source",
            Self::Sink => "sink",
            Self::Ledger => "ledger",
            Self::StopHook => "stop_hook",
            Self::Wedged => "wedged",
            Self::RestartCeiling => "restart_ceiling",
        }
    }

    /// Returns whether the supervisor may restart an instance that failed
    /// with this kind.
    #[must_use]
    pub const fn is_restartable(self) -> bool {
        !matches!(
            self,
            Self::Config | Self::Authentication | Self::RestartCeiling
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A recorded failure surfaced through status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentFailure {
    kind: FailureKind,
    message: String,
    occurred_at: DateTime<Utc>,
}

impl AgentFailure {
    /// Creates a failure stamped with the current clock time.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>, clock: &impl Clock) -> Self {
        Self {
            kind,
            message: message.into(),
            occurred_at: clock.utc(),
        }
    }

    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Returns the human-readable cause.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns when the failure was recorded.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl fmt::Display for AgentFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.kind, self.message)
    }
}

/// Point-in-time view of an instance returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    /// Owner and service.
    pub key: AgentKey,
    /// Version of the implementation backing the instance.
    pub version: AgentVersion,
    /// Current lifecycle state.
    pub state: AgentState,
    /// Health derived from state and failure history.
    pub health: AgentHealth,
    /// Most recent failure, if any.
    pub last_error: Option<AgentFailure>,
    /// Failures since the last successful reconfiguration.
    pub consecutive_failure_count: u32,
    /// Completion time of the latest cycle.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Latest lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

/// One live agent bound to an (owner, service) pair.
///
/// State, last error, and failure count change only through the transition
/// methods below.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInstance {
    key: AgentKey,
    version: AgentVersion,
    state: AgentState,
    config: AgentConfig,
    last_error: Option<AgentFailure>,
    consecutive_failure_count: u32,
    last_run_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    state_changed_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AgentInstance {
    /// Creates an instance in [`AgentState::Created`].
    #[must_use]
    pub fn new(
        key: AgentKey,
        version: AgentVersion,
        config: AgentConfig,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            key,
            version,
            state: AgentState::Created,
            config,
            last_error: None,
            consecutive_failure_count: 0,
            last_run_at: None,
            created_at: timestamp,
            state_changed_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Creates a fresh instance replacing `previous`, carrying its failure
    /// history forward.
    #[must_use]
    pub fn restarted_from(previous: &Self, config: AgentConfig, clock: &impl Clock) -> Self {
        let mut instance = Self::new(previous.key.clone(), previous.version, config, clock);
        instance.last_error.clone_from(&previous.last_error);
        instance.consecutive_failure_count = previous.consecutive_failure_count;
        instance.last_run_at = previous.last_run_at;
        instance
    }

    /// Returns the owner and service.
    #[must_use]
    pub const fn key(&self) -> &AgentKey {
        &self.key
    }

    /// Returns the implementation version.
    #[must_use]
    pub const fn version(&self) -> AgentVersion {
        self.version
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Returns the configuration snapshot the instance was started with.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the most recent failure.
    #[must_use]
    pub const fn last_error(&self) -> Option<&AgentFailure> {
        self.last_error.as_ref()
    }

    /// Returns failures recorded since the last reconfiguration.
    #[must_use]
    pub const fn consecutive_failure_count(&self) -> u32 {
        self.consecutive_failure_count
    }

    /// Returns when the latest cycle completed.
    #[must_use]
    pub const fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the instance entered its current state.
    #[must_use]
    pub const fn state_changed_at(&self) -> DateTime<Utc> {
        self.state_changed_at
    }

    /// Returns the latest lifecycle timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the latest sign of progress: the last completed cycle or the
    /// last state change, whichever is later.
    #[must_use]
    pub fn last_progress_at(&self) -> DateTime<Utc> {
        self.last_run_at
            .map_or(self.state_changed_at, |run| run.max(self.state_changed_at))
    }

    /// Moves the instance to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::InvalidLifecycleTransition`] when the
    /// state machine forbids the move.
    pub fn transition_to(
        &mut self,
        target: AgentState,
        clock: &impl Clock,
    ) -> Result<(), AgentDomainError> {
        if !self.state.can_transition_to(target) {
            return Err(AgentDomainError::InvalidLifecycleTransition {
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        self.touch(clock);
        self.state_changed_at = self.updated_at;
        Ok(())
    }

    /// Records `failure` and moves the instance to [`AgentState::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::InvalidLifecycleTransition`] when the
    /// instance is already terminal.
    pub fn fail(&mut self, failure: AgentFailure, clock: &impl Clock) -> Result<(), AgentDomainError> {
        self.transition_to(AgentState::Failed, clock)?;
        self.last_error = Some(failure);
        Ok(())
    }

    /// Records a failure that does not change lifecycle state.
    pub fn record_error(&mut self, failure: AgentFailure, clock: &impl Clock) {
        self.last_error = Some(failure);
        self.touch(clock);
    }

    /// Records a failure that counts toward the restart ceiling.
    pub fn record_failure(&mut self, failure: AgentFailure, clock: &impl Clock) {
        self.consecutive_failure_count = self.consecutive_failure_count.saturating_add(1);
        self.record_error(failure, clock);
    }

    /// Stamps completion of an operating cycle.
    pub fn record_cycle_completed(&mut self, clock: &impl Clock) {
        self.last_run_at = Some(clock.utc());
        self.touch(clock);
    }

    /// Clears failure history after a successful reconfiguration.
    pub fn reset_failures(&mut self, clock: &impl Clock) {
        self.consecutive_failure_count = 0;
        self.last_error = None;
        self.touch(clock);
    }

    /// Derives coarse health from state and failure history.
    #[must_use]
    pub const fn health(&self) -> AgentHealth {
        match self.state {
            AgentState::Failed => AgentHealth::Unhealthy,
            AgentState::Created | AgentState::Stopped => AgentHealth::Unknown,
            AgentState::Initializing
            | AgentState::Running
            | AgentState::Paused
            | AgentState::Stopping => {
                if self.consecutive_failure_count > 0 || self.last_error.is_some() {
                    AgentHealth::Degraded
                } else {
                    AgentHealth::Healthy
                }
            }
        }
    }

    /// Returns a status snapshot.
    #[must_use]
    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            key: self.key.clone(),
            version: self.version,
            state: self.state,
            health: self.health(),
            last_error: self.last_error.clone(),
            consecutive_failure_count: self.consecutive_failure_count,
            last_run_at: self.last_run_at,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
