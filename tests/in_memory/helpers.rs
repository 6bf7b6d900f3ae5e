//! Shared runtime wiring for in-memory integration tests.

use agentmate::{
    RuntimeContext,
    agent::{
        adapters::memory::ScriptedAgent,
        domain::{AgentDescriptor, AgentKey, AgentState, AgentStatus, AgentVersion, ServiceName},
        ports::{Agent, AgentHookError},
    },
    config::{
        adapters::InMemoryConfigProvider,
        domain::{
            AgentConfig, ConfigValues, RestartSettings, RetrySettings, RuntimeSettings,
            SupervisorSettings,
        },
        ports::ConfigProvider,
    },
    registry::{AgentFactory, AgentRegistry, AgentRegistryBuilder},
    supervisor::Supervisor,
};
use eyre::{Result, bail};
use mockable::DefaultClock;
use rstest::fixture;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;

type AgentBook = Arc<Mutex<BTreeMap<AgentKey, Arc<ScriptedAgent>>>>;
type CreationLog = Arc<Mutex<Vec<Creation>>>;
type SupervisorSlot = Arc<OnceLock<Weak<Supervisor<DefaultClock>>>>;

/// Dependency states seen at the moment an agent was constructed.
#[derive(Debug, Clone)]
pub struct Creation {
    /// Agent that was constructed.
    pub key: AgentKey,
    /// Same-owner dependencies and their state at construction time.
    pub dependency_states: Vec<(ServiceName, Option<AgentState>)>,
}

/// Builds an agent key from literal parts.
///
/// # Panics
///
/// Panics when the parts are not valid identifiers.
#[must_use]
pub fn key(owner: &str, service: &str) -> AgentKey {
    AgentKey::from_parts(owner, service).expect("valid agent key")
}

fn service(name: &str) -> ServiceName {
    ServiceName::new(name).expect("valid service name")
}

/// Settings with millisecond retries and a single restart.
#[fixture]
pub fn fast_settings() -> RuntimeSettings {
    RuntimeSettings {
        supervisor: SupervisorSettings {
            hook_timeout_ms: 500,
            stop_grace_ms: 500,
            init_max_attempts: 3,
            restart: RestartSettings {
                max_restarts: 1,
                base_delay_ms: 0,
                multiplier: 2,
                max_delay_ms: 0,
            },
            ..SupervisorSettings::default()
        },
        retry: RetrySettings {
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..RetrySettings::default()
        },
        ..RuntimeSettings::default()
    }
}

fn observing_factory(
    book: &AgentBook,
    creations: &CreationLog,
    supervisor: &SupervisorSlot,
    dependencies: &[&str],
) -> impl AgentFactory + 'static {
    let agents = Arc::clone(book);
    let log = Arc::clone(creations);
    let observer = Arc::clone(supervisor);
    let needs: Vec<ServiceName> = dependencies.iter().map(|name| service(name)).collect();
    move |agent_key: &AgentKey, _config: &AgentConfig| -> Result<Arc<dyn Agent>, AgentHookError> {
        let watching = observer.get().and_then(Weak::upgrade);
        let dependency_states = needs
            .iter()
            .map(|needed| {
                let dependency = AgentKey::new(agent_key.owner().clone(), needed.clone());
                let state = watching
                    .as_ref()
                    .and_then(|running| running.status(&dependency))
                    .map(|status| status.state);
                (needed.clone(), state)
            })
            .collect();
        log.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Creation {
                key: agent_key.clone(),
                dependency_states,
            });
        let mut known = agents.lock().unwrap_or_else(PoisonError::into_inner);
        let agent = known
            .entry(agent_key.clone())
            .or_insert_with(|| Arc::new(ScriptedAgent::default()));
        Ok(Arc::clone(agent) as Arc<dyn Agent>)
    }
}

fn registry(book: &AgentBook, creations: &CreationLog, supervisor: &SupervisorSlot) -> Result<AgentRegistry> {
    let release = AgentVersion::new(1, 0, 0);
    let built = AgentRegistry::builder()
        .register(
            AgentDescriptor::new(service("gmail"), release),
            observing_factory(book, creations, supervisor, &[]),
        )
        .and_then(|builder| {
            builder.register(
                AgentDescriptor::new(service("notion"), release),
                observing_factory(book, creations, supervisor, &[]),
            )
        })
        .and_then(|builder| {
            builder.register(
                AgentDescriptor::new(service("websocket"), release)
                    .with_dependency(service("gmail"), release),
                observing_factory(book, creations, supervisor, &["gmail"]),
            )
        })
        .and_then(AgentRegistryBuilder::build)?;
    Ok(built)
}

/// A supervisor over gmail, notion, and websocket (which depends on gmail)
/// agents backed by scripted collaborators.
pub struct Runtime {
    /// Supervisor under test.
    pub supervisor: Arc<Supervisor<DefaultClock>>,
    /// Configuration store consulted by the supervisor.
    pub config: Arc<InMemoryConfigProvider>,
    agents: AgentBook,
    creations: CreationLog,
}

impl Runtime {
    /// Wires a runtime with `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error when the registry cannot be built.
    pub fn new(settings: RuntimeSettings) -> Result<Self> {
        let agents = AgentBook::default();
        let creations = CreationLog::default();
        let slot = SupervisorSlot::default();
        let catalog = Arc::new(registry(&agents, &creations, &slot)?);
        let config = Arc::new(InMemoryConfigProvider::new(catalog.schema_catalog()));
        let context = Arc::new(RuntimeContext::in_memory(settings, Arc::new(DefaultClock)));
        let supervisor = Arc::new(Supervisor::new(
            catalog,
            Arc::clone(&config) as Arc<dyn ConfigProvider>,
            context,
        ));
        if slot.set(Arc::downgrade(&supervisor)).is_err() {
            bail!("supervisor slot already set");
        }
        Ok(Self {
            supervisor,
            config,
            agents,
            creations,
        })
    }

    /// Returns the scripted agent handed out for `agent_key`.
    #[must_use]
    pub fn agent(&self, agent_key: &AgentKey) -> Arc<ScriptedAgent> {
        let mut known = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            known
                .entry(agent_key.clone())
                .or_insert_with(|| Arc::new(ScriptedAgent::default())),
        )
    }

    /// Returns every agent construction observed so far.
    #[must_use]
    pub fn creations(&self) -> Vec<Creation> {
        self.creations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stores configuration for `agent_key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the values fail validation.
    pub async fn configure(&self, agent_key: &AgentKey, values: ConfigValues) -> Result<()> {
        self.config.put(agent_key, values).await?;
        Ok(())
    }

    /// Polls until the status of `agent_key` satisfies `accept`.
    ///
    /// # Errors
    ///
    /// Returns an error when the status never matches within three seconds.
    pub async fn wait_for(
        &self,
        agent_key: &AgentKey,
        accept: impl Fn(&AgentStatus) -> bool,
    ) -> Result<AgentStatus> {
        for _ in 0..300 {
            if let Some(status) = self.supervisor.status(agent_key)
                && accept(&status)
            {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        bail!(
            "{agent_key} never reached the expected status: {:?}",
            self.supervisor.status(agent_key)
        )
    }
}

/// Polls until `check` holds.
///
/// # Errors
///
/// Returns an error naming `what` when `check` never holds within three
/// seconds.
pub async fn eventually(what: &str, check: impl Fn() -> bool) -> Result<()> {
    for _ in 0..300 {
        if check() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("timed out waiting for {what}")
}
