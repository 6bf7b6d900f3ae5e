//! Owner of every live agent instance.

use crate::agent::{
    domain::{AgentFailure, AgentInstance, AgentKey, AgentState, AgentStatus, FailureKind, OwnerId},
    services::{AgentRunner, ControlHandle, InstanceCell, RunCommand, control_channel},
};
use crate::config::{
    domain::{AgentConfig, ConfigValues},
    ports::{ConfigProvider, ConfigProviderError},
};
use crate::context::RuntimeContext;
use crate::event_bus::domain::Topic;
use crate::registry::{AgentRegistry, RegistryError};
use crate::supervisor::domain::{
    HealthReport, RestartDecision, RestartPolicy, StartPlan, StartReport, StopReport,
    SupervisorError, SupervisorResult,
};
use chrono::TimeDelta;
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const SUPERVISOR_SOURCE: &str = "supervisor";

/// Run-loop handle for one instance.
struct Slot {
    control: ControlHandle,
    task: Option<JoinHandle<AgentState>>,
    restart_due: Option<Instant>,
    given_up: bool,
    /// Stopped on request or disabled; health passes leave it alone.
    held: bool,
}

impl Slot {
    fn is_live(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Per-instance bookkeeping. The cell sits outside the slot lock so status
/// queries never wait on a stop or restart in progress.
#[derive(Default)]
struct Entry {
    cell: RwLock<Option<Arc<InstanceCell>>>,
    slot: Mutex<Option<Slot>>,
}

impl Entry {
    fn cell(&self) -> Option<Arc<InstanceCell>> {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_cell(&self, cell: Arc<InstanceCell>) {
        *self.cell.write().unwrap_or_else(PoisonError::into_inner) = Some(cell);
    }
}

/// Starts, stops, reconfigures, and restarts agent instances.
///
/// Every operation targets a single instance's entry; a slow stop or
/// reconfiguration of one instance never blocks another.
pub struct Supervisor<C>
where
    C: Clock + Send + Sync + 'static,
{
    registry: Arc<AgentRegistry>,
    config: Arc<dyn ConfigProvider>,
    context: Arc<RuntimeContext<C>>,
    restart_policy: RestartPolicy,
    entries: RwLock<HashMap<AgentKey, Arc<Entry>>>,
}

impl<C> Supervisor<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a supervisor with no live instances.
    #[must_use]
    pub fn new(
        registry: Arc<AgentRegistry>,
        config: Arc<dyn ConfigProvider>,
        context: Arc<RuntimeContext<C>>,
    ) -> Self {
        let restart_policy = RestartPolicy::from_settings(&context.settings().supervisor.restart);
        Self {
            registry,
            config,
            context,
            restart_policy,
            entries: RwLock::default(),
        }
    }

    /// Returns the runtime context shared with every instance.
    #[must_use]
    pub const fn context(&self) -> &Arc<RuntimeContext<C>> {
        &self.context
    }

    fn entry(&self, key: &AgentKey) -> Arc<Entry> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key.clone()).or_default())
    }

    fn existing(&self, key: &AgentKey) -> Option<Arc<Entry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn managed(&self, key: &AgentKey) -> SupervisorResult<(Arc<Entry>, Arc<InstanceCell>)> {
        let entry = self
            .existing(key)
            .ok_or_else(|| SupervisorError::NotFound(key.clone()))?;
        let cell = entry
            .cell()
            .ok_or_else(|| SupervisorError::NotFound(key.clone()))?;
        Ok((entry, cell))
    }

    fn cell_of(&self, key: &AgentKey) -> Option<Arc<InstanceCell>> {
        self.existing(key).and_then(|entry| entry.cell())
    }

    fn snapshot_entries(&self) -> Vec<(AgentKey, Arc<Entry>)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut listed: Vec<_> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), Arc::clone(entry)))
            .collect();
        listed.sort_by(|left, right| left.0.cmp(&right.0));
        listed
    }

    /// Builds a fresh instance for `key` and spawns its run-loop.
    fn launch(
        &self,
        entry: &Entry,
        key: &AgentKey,
        config: AgentConfig,
        previous: Option<&AgentInstance>,
        reset_failures: bool,
    ) -> SupervisorResult<Slot> {
        let descriptor = self
            .registry
            .descriptor(key.service())
            .ok_or_else(|| RegistryError::UnknownService(key.service().clone()))?;
        let agent = self.registry.create(key, &config)?;
        let clock = self.context.clock();
        let mut instance = match previous {
            Some(prior) => AgentInstance::restarted_from(prior, config, clock),
            None => AgentInstance::new(key.clone(), descriptor.version(), config, clock),
        };
        if reset_failures {
            instance.reset_failures(clock);
        }

        let cell = Arc::new(InstanceCell::new(instance));
        let (control, signal) = control_channel();
        let runner = AgentRunner::new(Arc::clone(&cell), agent, Arc::clone(&self.context), signal);
        let task = tokio::spawn(runner.run());
        entry.replace_cell(cell);
        tracing::info!(agent = %key, "agent launched");
        Ok(Slot {
            control,
            task: Some(task),
            restart_due: None,
            given_up: false,
            held: false,
        })
    }

    /// Stops the run-loop held in `slot`, aborting it when it overruns the
    /// grace period.
    async fn halt(&self, key: &AgentKey, slot: &mut Slot, cell: &InstanceCell) -> SupervisorResult<()> {
        slot.control.stop();
        slot.restart_due = None;
        let Some(mut task) = slot.task.take() else {
            return Ok(());
        };
        let settings = &self.context.settings().supervisor;
        let grace = settings.stop_grace().saturating_add(settings.hook_timeout());
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(state)) => {
                tracing::debug!(agent = %key, state = %state, "run-loop finished");
                Ok(())
            }
            Ok(Err(err)) => {
                tracing::warn!(agent = %key, error = %err, "run-loop terminated abnormally");
                self.force_failed(cell, FailureKind::Wedged, format!("run-loop terminated: {err}"));
                Ok(())
            }
            Err(_) => {
                task.abort();
                if let Err(err) = task.await
                    && !err.is_cancelled()
                {
                    tracing::warn!(agent = %key, error = %err, "aborted run-loop terminated abnormally");
                }
                tracing::warn!(agent = %key, ?grace, "run-loop did not stop in time; aborted");
                self.force_failed(
                    cell,
                    FailureKind::Wedged,
                    format!("did not stop within {grace:?}"),
                );
                Err(SupervisorError::Wedged(key.clone()))
            }
        }
    }

    /// Marks `cell` failed, or records the failure when it is already
    /// terminal.
    fn force_failed(&self, cell: &InstanceCell, kind: FailureKind, message: String) {
        let clock = self.context.clock();
        let failure = AgentFailure::new(kind, message, clock);
        cell.update(|instance| {
            if instance.state().is_terminal() {
                instance.record_error(failure, clock);
            } else if let Err(err) = instance.fail(failure, clock) {
                tracing::warn!(agent = %instance.key(), error = %err, "failure not recorded");
            }
        });
    }

    /// Starts the instance for `key` using its stored configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Disabled`] when configuration disables the
    /// instance, [`SupervisorError::DependencyNotRunning`] when a declared
    /// dependency of the same owner is not running, and
    /// [`SupervisorError::AlreadyActive`] when a run-loop is live.
    pub async fn start(&self, key: &AgentKey) -> SupervisorResult<AgentStatus> {
        let config = self.config.get(key).await?;
        if !config.enabled() {
            return Err(SupervisorError::Disabled(key.clone()));
        }
        let descriptor = self
            .registry
            .descriptor(key.service())
            .ok_or_else(|| RegistryError::UnknownService(key.service().clone()))?;
        for service in descriptor.dependency_names() {
            let dependency = AgentKey::new(key.owner().clone(), service);
            let state = self.cell_of(&dependency).map(|cell| cell.state());
            if !matches!(state, Some(AgentState::Running | AgentState::Paused)) {
                return Err(SupervisorError::DependencyNotRunning {
                    key: key.clone(),
                    dependency,
                });
            }
        }
        self.start_instance(key, config).await
    }

    async fn start_instance(&self, key: &AgentKey, config: AgentConfig) -> SupervisorResult<AgentStatus> {
        let entry = self.entry(key);
        let mut slot = entry.slot.lock().await;
        if slot.as_ref().is_some_and(Slot::is_live) {
            return Err(SupervisorError::AlreadyActive(key.clone()));
        }
        let launched = self.launch(&entry, key, config, None, false)?;
        *slot = Some(launched);
        drop(slot);
        entry
            .cell()
            .map(|cell| cell.status())
            .ok_or_else(|| SupervisorError::NotFound(key.clone()))
    }

    /// Starts every enabled instance in dependency order.
    ///
    /// Each instance is launched only once every dependency of the same
    /// owner has reached `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Config`] when configuration cannot be
    /// listed and [`SupervisorError::DependencyCycle`] when instance
    /// dependencies are cyclic; nothing is started in either case.
    pub async fn start_all(&self) -> SupervisorResult<StartReport> {
        let configured = self.config.list_enabled().await?;
        self.start_planned(configured).await
    }

    /// Starts every enabled instance belonging to `owner`.
    ///
    /// # Errors
    ///
    /// As for [`Supervisor::start_all`].
    pub async fn start_all_for_owner(&self, owner: &OwnerId) -> SupervisorResult<StartReport> {
        let configured = self
            .config
            .list_for_owner(owner)
            .await?
            .into_iter()
            .filter(|(_, config)| config.enabled())
            .collect();
        self.start_planned(configured).await
    }

    async fn start_planned(&self, configured: Vec<(AgentKey, AgentConfig)>) -> SupervisorResult<StartReport> {
        let mut configs: HashMap<AgentKey, AgentConfig> = configured.into_iter().collect();
        let plan = StartPlan::build(configs.keys().cloned(), &self.registry)
            .map_err(|cycle| SupervisorError::DependencyCycle(cycle.0))?;
        let mut report = StartReport {
            skipped: plan.skipped().to_vec(),
            ..StartReport::default()
        };
        for (key, issue) in &report.skipped {
            tracing::warn!(agent = %key, reason = %issue, "agent skipped at start");
        }

        let settings = &self.context.settings().supervisor;
        let readiness = settings
            .hook_timeout()
            .saturating_mul(settings.init_max_attempts.saturating_add(1));
        for key in plan.order() {
            let Some(config) = configs.remove(key) else {
                continue;
            };
            if let Err(err) = self.await_dependencies(key, &plan.dependencies_of(key), readiness).await {
                tracing::warn!(agent = %key, error = %err, "agent not started");
                report.failed.push((key.clone(), err));
                continue;
            }
            match self.start_instance(key, config).await {
                Ok(_) => report.started.push(key.clone()),
                Err(err) => {
                    tracing::warn!(agent = %key, error = %err, "agent not started");
                    report.failed.push((key.clone(), err));
                }
            }
        }
        tracing::info!(
            started = report.started.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "start pass finished"
        );
        Ok(report)
    }

    async fn await_dependencies(
        &self,
        key: &AgentKey,
        dependencies: &[AgentKey],
        readiness: Duration,
    ) -> SupervisorResult<()> {
        for dependency in dependencies {
            let ready = match self.cell_of(dependency) {
                Some(cell) => {
                    let state = cell
                        .wait_for_state(readiness, |state| {
                            matches!(state, AgentState::Running | AgentState::Paused)
                                || state.is_terminal()
                        })
                        .await;
                    matches!(state, AgentState::Running | AgentState::Paused)
                }
                None => false,
            };
            if !ready {
                return Err(SupervisorError::DependencyNotRunning {
                    key: key.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        Ok(())
    }

    /// Stops the instance for `key`, waiting for its stop hook.
    ///
    /// Stopping an instance that is not live returns its status unchanged.
    /// A stopped instance is never restarted by a health pass, even when its
    /// stop hook failed; only an explicit start or restart revives it.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotFound`] for unknown keys and
    /// [`SupervisorError::Wedged`] when the run-loop had to be aborted.
    pub async fn stop(&self, key: &AgentKey) -> SupervisorResult<AgentStatus> {
        let (entry, cell) = self.managed(key)?;
        let mut guard = entry.slot.lock().await;
        if let Some(slot) = guard.as_mut() {
            slot.held = true;
            self.halt(key, slot, &cell).await?;
        }
        Ok(cell.status())
    }

    /// Stops every live instance, dependents first.
    pub async fn stop_all(&self) -> StopReport {
        let keys = self.snapshot_entries().into_iter().map(|(key, _)| key);
        self.stop_planned(keys.collect()).await
    }

    /// Stops every live instance belonging to `owner`, dependents first.
    pub async fn stop_all_for_owner(&self, owner: &OwnerId) -> StopReport {
        let keys = self
            .snapshot_entries()
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key.owner() == owner);
        self.stop_planned(keys.collect()).await
    }

    async fn stop_planned(&self, keys: Vec<AgentKey>) -> StopReport {
        let mut order = match StartPlan::build(keys.iter().cloned(), &self.registry) {
            Ok(plan) => {
                let mut planned = plan.order().to_vec();
                planned.extend(plan.skipped().iter().map(|(key, _)| key.clone()));
                planned
            }
            Err(cycle) => {
                tracing::warn!(members = ?cycle.0, "dependency cycle while stopping; using key order");
                keys
            }
        };
        order.reverse();

        let mut report = StopReport::default();
        for key in order {
            let Ok((entry, cell)) = self.managed(&key) else {
                continue;
            };
            let mut guard = entry.slot.lock().await;
            let Some(slot) = guard.as_mut() else {
                continue;
            };
            slot.held = true;
            slot.restart_due = None;
            if slot.task.is_none() {
                continue;
            }
            match self.halt(&key, slot, &cell).await {
                Ok(()) => report.stopped.push(key),
                Err(err) => report.failed.push((key, err)),
            }
        }
        report
    }

    /// Stops then relaunches the instance for `key` with a fresh instance
    /// that keeps its failure history.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotFound`] for unknown keys and any error
    /// raised while reading configuration or constructing the agent.
    pub async fn restart(&self, key: &AgentKey) -> SupervisorResult<AgentStatus> {
        let (entry, cell) = self.managed(key)?;
        let config = self.config.get(key).await?;
        if !config.enabled() {
            return Err(SupervisorError::Disabled(key.clone()));
        }
        let mut guard = entry.slot.lock().await;
        if let Some(slot) = guard.as_mut()
            && let Err(err) = self.halt(key, slot, &cell).await
        {
            tracing::warn!(agent = %key, error = %err, "restarting after forced stop");
        }
        let previous = cell.snapshot();
        *guard = Some(self.launch(&entry, key, config, Some(&previous), false)?);
        drop(guard);
        self.status(key)
            .ok_or_else(|| SupervisorError::NotFound(key.clone()))
    }

    /// Asks the instance to park after its in-flight cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidState`] unless the instance is
    /// `Running`.
    pub async fn pause(&self, key: &AgentKey) -> SupervisorResult<AgentStatus> {
        let (entry, cell) = self.managed(key)?;
        let guard = entry.slot.lock().await;
        let state = cell.state();
        match guard.as_ref() {
            Some(slot) if state == AgentState::Running && slot.is_live() => {
                slot.control.pause();
                tracing::info!(agent = %key, "pause requested");
                Ok(cell.status())
            }
            _ => Err(SupervisorError::InvalidState {
                key: key.clone(),
                state,
                operation: "pause",
            }),
        }
    }

    /// Resumes a paused instance, or cancels a pause not yet taken.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidState`] when the instance is neither
    /// paused nor pausing.
    pub async fn resume(&self, key: &AgentKey) -> SupervisorResult<AgentStatus> {
        let (entry, cell) = self.managed(key)?;
        let guard = entry.slot.lock().await;
        let state = cell.state();
        match guard.as_ref() {
            Some(slot)
                if slot.is_live()
                    && (state == AgentState::Paused || slot.control.current() == RunCommand::Pause) =>
            {
                slot.control.run();
                tracing::info!(agent = %key, "resume requested");
                Ok(cell.status())
            }
            _ => Err(SupervisorError::InvalidState {
                key: key.clone(),
                state,
                operation: "resume",
            }),
        }
    }

    /// Validates and stores new settings for `key`, then replaces a live
    /// instance with one built from them.
    ///
    /// The live instance finishes its in-flight cycle, is paused and
    /// stopped, and a fresh instance starts with a cleared failure count.
    /// Returns `None` when no instance was live or the new settings disable
    /// it. Other instances are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Config`] when the settings fail
    /// validation; the live instance is left running untouched.
    pub async fn update_settings(
        &self,
        key: &AgentKey,
        values: ConfigValues,
    ) -> SupervisorResult<Option<AgentStatus>> {
        let config = self.config.put(key, values).await?;
        let Some(entry) = self.existing(key) else {
            return Ok(None);
        };
        let mut guard = entry.slot.lock().await;
        let Some(slot) = guard.as_mut() else {
            return Ok(None);
        };
        if !slot.is_live() {
            if !config.enabled() {
                slot.held = true;
                slot.restart_due = None;
                tracing::info!(agent = %key, "agent disabled by new settings");
            }
            return Ok(None);
        }
        let Some(cell) = entry.cell() else {
            return Ok(None);
        };

        let supervisor = &self.context.settings().supervisor;
        let settle = supervisor
            .stop_grace()
            .saturating_add(self.context.settings().cycle.stage_timeout().saturating_mul(3));
        slot.control.pause();
        let state = cell
            .wait_for_state(settle, |state| state == AgentState::Paused || state.is_terminal())
            .await;
        tracing::debug!(agent = %key, state = %state, "instance settled for reconfiguration");
        if let Err(err) = self.halt(key, slot, &cell).await {
            tracing::warn!(agent = %key, error = %err, "reconfiguring after forced stop");
        }
        if !config.enabled() {
            slot.held = true;
            tracing::info!(agent = %key, "agent disabled by new settings");
            return Ok(None);
        }

        let previous = cell.snapshot();
        *guard = Some(self.launch(&entry, key, config, Some(&previous), true)?);
        drop(guard);
        tracing::info!(agent = %key, "agent reconfigured");
        Ok(self.status(key))
    }

    /// Runs one health pass: restarts wedged and failed instances within
    /// the restart ceiling and reports those beyond it on `agent.failed`.
    ///
    /// Instances busy with another supervisor operation are skipped until
    /// the next pass.
    pub async fn check_health(&self) -> HealthReport {
        let mut report = HealthReport::default();
        for (key, entry) in self.snapshot_entries() {
            let Ok(mut guard) = entry.slot.try_lock() else {
                continue;
            };
            let (Some(slot), Some(cell)) = (guard.as_mut(), entry.cell()) else {
                continue;
            };
            report.checked = report.checked.saturating_add(1);
            self.inspect(&key, &entry, slot, &cell, &mut report).await;
        }
        self.context
            .publish(Topic::health_tick(), &report, SUPERVISOR_SOURCE)
            .await;
        report
    }

    async fn inspect(
        &self,
        key: &AgentKey,
        entry: &Entry,
        slot: &mut Slot,
        cell: &InstanceCell,
        report: &mut HealthReport,
    ) {
        if slot.held {
            return;
        }
        let instance = cell.snapshot();
        match instance.state() {
            AgentState::Running if self.is_wedged(&instance) => {
                report.wedged.push(key.clone());
                tracing::warn!(agent = %key, last_progress = %instance.last_progress_at(), "agent wedged");
                let clock = self.context.clock();
                let failure = AgentFailure::new(FailureKind::Wedged, "no progress within liveness window", clock);
                let failures = cell.update(|current| {
                    current.record_failure(failure, clock);
                    current.consecutive_failure_count()
                });
                match self.restart_policy.decide(failures) {
                    RestartDecision::GiveUp => {
                        self.force_failed(cell, FailureKind::RestartCeiling, self.ceiling_message(failures));
                        if let Err(err) = self.halt(key, slot, cell).await {
                            tracing::warn!(agent = %key, error = %err, "forced stop after giving up");
                        }
                        self.give_up(key, slot, cell, report).await;
                    }
                    RestartDecision::Restart { .. } => {
                        if let Err(err) = self.halt(key, slot, cell).await {
                            tracing::warn!(agent = %key, error = %err, "restarting after forced stop");
                        }
                        self.relaunch(key, entry, slot, cell, report).await;
                    }
                }
            }
            AgentState::Failed if !slot.given_up => {
                let restartable = instance
                    .last_error()
                    .is_none_or(|failure| failure.kind().is_restartable());
                if !restartable {
                    self.give_up(key, slot, cell, report).await;
                    return;
                }
                match slot.restart_due {
                    None => self.schedule_restart(key, slot, cell, &instance, report).await,
                    Some(due) if Instant::now() >= due => {
                        if let Err(err) = self.halt(key, slot, cell).await {
                            tracing::warn!(agent = %key, error = %err, "reaping failed run-loop");
                        }
                        self.relaunch(key, entry, slot, cell, report).await;
                    }
                    Some(_) => {}
                }
            }
            _ => {}
        }
    }

    fn is_wedged(&self, instance: &AgentInstance) -> bool {
        let multiplier = self.context.settings().supervisor.wedge_multiplier;
        let window = instance.config().interval().saturating_mul(multiplier);
        let limit = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
        self.context
            .clock()
            .utc()
            .signed_duration_since(instance.last_progress_at())
            > limit
    }

    fn ceiling_message(&self, failures: u32) -> String {
        format!(
            "{failures} consecutive failures exceed the restart ceiling of {}",
            self.restart_policy.max_restarts()
        )
    }

    async fn schedule_restart(
        &self,
        key: &AgentKey,
        slot: &mut Slot,
        cell: &InstanceCell,
        instance: &AgentInstance,
        report: &mut HealthReport,
    ) {
        let clock = self.context.clock();
        let failure = instance.last_error().cloned().unwrap_or_else(|| {
            AgentFailure::new(FailureKind::Wedged, "run-loop ended without a recorded cause", clock)
        });
        let failures = cell.update(|current| {
            current.record_failure(failure, clock);
            current.consecutive_failure_count()
        });
        match self.restart_policy.decide(failures) {
            RestartDecision::GiveUp => {
                self.force_failed(cell, FailureKind::RestartCeiling, self.ceiling_message(failures));
                self.give_up(key, slot, cell, report).await;
            }
            RestartDecision::Restart { after } => {
                tracing::warn!(agent = %key, failures, delay = ?after, "restart scheduled");
                slot.restart_due = Some(Instant::now() + after);
            }
        }
    }

    /// Relaunches from the stored configuration, so settings written while
    /// the instance was down take effect and a disabled instance stays down.
    async fn relaunch(
        &self,
        key: &AgentKey,
        entry: &Entry,
        slot: &mut Slot,
        cell: &InstanceCell,
        report: &mut HealthReport,
    ) {
        let config = match self.config.get(key).await {
            Ok(config) if config.enabled() => config,
            Ok(_) | Err(ConfigProviderError::NotFound(_)) => {
                tracing::info!(agent = %key, "agent no longer enabled; not restarted");
                slot.held = true;
                slot.restart_due = None;
                return;
            }
            Err(err) => {
                tracing::error!(agent = %key, error = %err, "configuration unavailable; restart deferred");
                slot.restart_due = None;
                return;
            }
        };
        let previous = cell.snapshot();
        match self.launch(entry, key, config, Some(&previous), false) {
            Ok(launched) => {
                *slot = launched;
                tracing::warn!(
                    agent = %key,
                    failures = previous.consecutive_failure_count(),
                    "agent restarted"
                );
                report.restarted.push(key.clone());
            }
            Err(err) => {
                tracing::error!(agent = %key, error = %err, "agent could not be restarted");
                slot.restart_due = None;
            }
        }
    }

    async fn give_up(&self, key: &AgentKey, slot: &mut Slot, cell: &InstanceCell, report: &mut HealthReport) {
        slot.given_up = true;
        slot.restart_due = None;
        let status = cell.status();
        tracing::error!(
            agent = %key,
            failures = status.consecutive_failure_count,
            "agent failed permanently"
        );
        self.context
            .publish(Topic::agent_failed(), &status, SUPERVISOR_SOURCE)
            .await;
        report.failed.push(key.clone());
    }

    /// Runs [`Supervisor::check_health`] on the configured interval until the
    /// supervisor is dropped.
    #[must_use]
    pub fn spawn_health_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let supervisor = Arc::downgrade(self);
        let period = self.context.settings().supervisor.health_check_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(active) = supervisor.upgrade() else {
                    break;
                };
                let report = active.check_health().await;
                tracing::debug!(checked = report.checked, "health pass finished");
            }
        })
    }

    /// Returns the status of the instance for `key`.
    #[must_use]
    pub fn status(&self, key: &AgentKey) -> Option<AgentStatus> {
        self.cell_of(key).map(|cell| cell.status())
    }

    /// Returns whether the instance for `key` is `Running`.
    #[must_use]
    pub fn is_running(&self, key: &AgentKey) -> bool {
        self.cell_of(key)
            .is_some_and(|cell| cell.state() == AgentState::Running)
    }

    /// Returns statuses of `owner`'s instances that are neither stopped nor
    /// failed.
    #[must_use]
    pub fn list_active(&self, owner: &OwnerId) -> Vec<AgentStatus> {
        self.snapshot_entries()
            .into_iter()
            .filter(|(key, _)| key.owner() == owner)
            .filter_map(|(_, entry)| entry.cell())
            .map(|cell| cell.status())
            .filter(|status| status.state.is_active())
            .collect()
    }

    /// Returns statuses of every managed instance.
    #[must_use]
    pub fn list_all(&self) -> Vec<AgentStatus> {
        self.snapshot_entries()
            .into_iter()
            .filter_map(|(_, entry)| entry.cell())
            .map(|cell| cell.status())
            .collect()
    }

    /// Stops every instance and drains the event bus.
    pub async fn shutdown(&self) -> StopReport {
        let report = self.stop_all().await;
        self.context.bus().shutdown().await;
        tracing::info!(stopped = report.stopped.len(), failed = report.failed.len(), "supervisor shut down");
        report
    }
}
