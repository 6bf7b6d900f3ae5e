//! The per-instance run-loop driving the agent state machine.

use super::{ControlSignal, CycleError, CycleExecutor, InstanceCell, RunCommand};
use crate::agent::{
    domain::{
        AgentFailure, AgentKey, AgentState, FailureKind, LifecyclePayload, LifecycleVerb,
    },
    ports::Agent,
};
use crate::config::domain::AgentConfig;
use crate::context::RuntimeContext;
use crate::resilience::{Backoff, RetryPolicy, Retryable};
use mockable::Clock;
use std::fmt;
use std::sync::Arc;

const RUNNER_SOURCE: &str = "agent.runner";

#[derive(Debug)]
struct HookFailure(String);

impl fmt::Display for HookFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl Retryable for HookFailure {
    fn is_retryable(&self) -> bool {
        true
    }
}

enum Step {
    Continue,
    Exit,
}

/// Drives one [`crate::agent::domain::AgentInstance`] from `Created` to a
/// terminal state.
///
/// The runner is the only writer of the instance's lifecycle fields. The
/// supervisor steers it through a [`ControlSignal`], which is consulted at
/// every suspension point.
pub struct AgentRunner<C>
where
    C: Clock + Send + Sync + 'static,
{
    key: AgentKey,
    cell: Arc<InstanceCell>,
    agent: Arc<dyn Agent>,
    config: AgentConfig,
    context: Arc<RuntimeContext<C>>,
    signal: ControlSignal,
    auth_misses: u32,
}

impl<C> AgentRunner<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a runner for the instance held in `cell`.
    #[must_use]
    pub fn new(
        cell: Arc<InstanceCell>,
        agent: Arc<dyn Agent>,
        context: Arc<RuntimeContext<C>>,
        signal: ControlSignal,
    ) -> Self {
        let instance = cell.snapshot();
        Self {
            key: instance.key().clone(),
            config: instance.config().clone(),
            cell,
            agent,
            context,
            signal,
            auth_misses: 0,
        }
    }

    fn transition(&self, target: AgentState) -> bool {
        let clock = self.context.clock();
        match self.cell.update(|instance| instance.transition_to(target, clock)) {
            Ok(()) => {
                tracing::debug!(agent = %self.key, state = %target, "agent state changed");
                true
            }
            Err(err) => {
                tracing::warn!(agent = %self.key, error = %err, "rejected lifecycle transition");
                false
            }
        }
    }

    fn fail(&self, kind: FailureKind, message: impl Into<String>) {
        let clock = self.context.clock();
        let failure = AgentFailure::new(kind, message, clock);
        tracing::warn!(agent = %self.key, failure = %failure, "agent failed");
        if let Err(err) = self.cell.update(|instance| instance.fail(failure, clock)) {
            tracing::warn!(agent = %self.key, error = %err, "failure not recorded");
        }
    }

    fn record_error(&self, kind: FailureKind, message: impl Into<String>) {
        let clock = self.context.clock();
        let failure = AgentFailure::new(kind, message, clock);
        tracing::warn!(agent = %self.key, failure = %failure, "cycle error");
        self.cell.update(|instance| instance.record_error(failure, clock));
    }

    async fn announce(&self, verb: LifecycleVerb) {
        self.context
            .publish(
                verb.topic(self.key.service()),
                &LifecyclePayload::milestone(&self.key),
                RUNNER_SOURCE,
            )
            .await;
    }

    /// Runs the instance to completion and returns its final state.
    pub async fn run(mut self) -> AgentState {
        if !self.transition(AgentState::Initializing) {
            return self.cell.state();
        }
        match self.initialize().await {
            Ok(()) => {}
            Err(None) => return self.shut_down().await,
            Err(Some(message)) => {
                self.fail(FailureKind::Initialize, message);
                return self.cell.state();
            }
        }
        if !self.transition(AgentState::Running) {
            return self.cell.state();
        }
        self.announce(LifecycleVerb::Started).await;
        tracing::info!(agent = %self.key, "agent running");

        let mut executor = CycleExecutor::new(
            self.key.clone(),
            Arc::clone(&self.agent),
            self.config.clone(),
            Arc::clone(&self.context),
        );
        loop {
            match self.signal.current() {
                RunCommand::Stop => break,
                RunCommand::Pause => {
                    if matches!(self.pause().await, Step::Exit) {
                        break;
                    }
                    continue;
                }
                RunCommand::Run => {}
            }
            if matches!(self.cycle(&mut executor).await, Step::Exit) {
                break;
            }
            if self.signal.sleep(self.config.interval()).await == RunCommand::Stop {
                break;
            }
        }
        self.shut_down().await
    }

    /// Returns `Err(None)` when stopped during initialization.
    async fn initialize(&self) -> Result<(), Option<String>> {
        let settings = self.context.settings();
        let timeout = settings.supervisor.hook_timeout();
        let policy = RetryPolicy::new(
            settings.supervisor.init_max_attempts,
            Backoff::from_retry_settings(&settings.retry),
        );
        let agent = self.agent.as_ref();
        let config = &self.config;
        let seed = self.key.to_string();
        let attempts = policy.execute(&seed, |attempt| async move {
            tracing::debug!(attempt, "initializing agent");
            match tokio::time::timeout(timeout, agent.initialize(config)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(HookFailure(err.message().to_owned())),
                Err(_) => Err(HookFailure(format!("initialize timed out after {timeout:?}"))),
            }
        });
        tokio::select! {
            outcome = attempts => outcome.map_err(|err| Some(err.to_string())),
            () = self.signal.stop_requested() => Err(None),
        }
    }

    async fn cycle(&mut self, executor: &mut CycleExecutor<C>) -> Step {
        match executor.run_cycle(&self.signal).await {
            Ok(_) => {
                self.auth_misses = 0;
                let clock = self.context.clock();
                self.cell.update(|instance| instance.record_cycle_completed(clock));
                Step::Continue
            }
            Err(CycleError::Stopped) => Step::Continue,
            Err(CycleError::NotAuthenticated) => {
                self.auth_misses = self.auth_misses.saturating_add(1);
                let grace = self.context.settings().cycle.auth_grace_cycles;
                if self.auth_misses > grace {
                    self.fail(
                        FailureKind::Authentication,
                        format!("not authenticated for {} consecutive cycles", self.auth_misses),
                    );
                    return Step::Exit;
                }
                self.record_error(FailureKind::Authentication, "owner is not authenticated");
                Step::Continue
            }
            Err(CycleError::Source(err)) if !err.inner().is_retryable() => {
                self.fail(FailureKind::Source, err.to_string());
                Step::Exit
            }
            Err(CycleError::Source(err)) => {
                self.record_error(FailureKind::Source, err.to_string());
                Step::Continue
            }
            Err(CycleError::Ledger(err)) => {
                self.record_error(FailureKind::Ledger, err.to_string());
                Step::Continue
            }
        }
    }

    /// Parks the loop until resumed; `Exit` when a stop arrives instead.
    async fn pause(&self) -> Step {
        if self.cell.state() == AgentState::Running {
            if !self.transition(AgentState::Paused) {
                return Step::Exit;
            }
            self.announce(LifecycleVerb::Paused).await;
        }
        match self.signal.resumed().await {
            RunCommand::Stop => Step::Exit,
            RunCommand::Run | RunCommand::Pause => {
                if !self.transition(AgentState::Running) {
                    return Step::Exit;
                }
                self.announce(LifecycleVerb::Resumed).await;
                Step::Continue
            }
        }
    }

    /// Runs the stop hook. The hook runs even when the instance was already
    /// failed by the supervisor, so agent resources are always released.
    async fn shut_down(self) -> AgentState {
        let stopping = self.transition(AgentState::Stopping);
        let timeout = self.context.settings().supervisor.hook_timeout();
        let outcome = match tokio::time::timeout(timeout, self.agent.stop()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.message().to_owned()),
            Err(_) => Err(format!("stop timed out after {timeout:?}")),
        };
        match (stopping, outcome) {
            (true, Ok(())) => {
                if self.transition(AgentState::Stopped) {
                    self.announce(LifecycleVerb::Stopped).await;
                    tracing::info!(agent = %self.key, "agent stopped");
                }
            }
            (true, Err(message)) => self.fail(FailureKind::StopHook, message),
            (false, Err(message)) => {
                tracing::warn!(agent = %self.key, error = %message, "stop hook failed");
            }
            (false, Ok(())) => {}
        }
        self.cell.state()
    }
}
