//! Shared world state for agent lifecycle BDD scenarios.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use agentmate::{
    RuntimeContext,
    agent::{
        adapters::memory::ScriptedAgent,
        domain::{AgentDescriptor, AgentKey, AgentStatus, AgentVersion, ServiceName},
        ports::{Agent, AgentHookError},
    },
    config::{
        adapters::InMemoryConfigProvider,
        domain::{AgentConfig, RetrySettings, RuntimeSettings, SupervisorSettings},
        ports::ConfigProvider,
    },
    registry::{AgentFactory, AgentRegistry, AgentRegistryBuilder},
    supervisor::{Supervisor, SupervisorError},
};
use eyre::eyre;
use mockable::DefaultClock;
use rstest::fixture;

type AgentBook = Arc<Mutex<BTreeMap<AgentKey, Arc<ScriptedAgent>>>>;

/// Scenario world holding a supervisor over scripted agents.
pub struct LifecycleWorld {
    pub supervisor: Arc<Supervisor<DefaultClock>>,
    pub config: Arc<InMemoryConfigProvider>,
    pub last_error: Option<SupervisorError>,
    agents: AgentBook,
}

fn book_factory(book: &AgentBook) -> impl AgentFactory + 'static {
    let agents = Arc::clone(book);
    move |agent_key: &AgentKey, _config: &AgentConfig| -> Result<Arc<dyn Agent>, AgentHookError> {
        let mut known = agents.lock().unwrap_or_else(PoisonError::into_inner);
        let agent = known
            .entry(agent_key.clone())
            .or_insert_with(|| Arc::new(ScriptedAgent::default()));
        Ok(Arc::clone(agent) as Arc<dyn Agent>)
    }
}

fn registry(book: &AgentBook) -> Result<AgentRegistry, eyre::Report> {
    let release = AgentVersion::new(1, 0, 0);
    let gmail = ServiceName::new("gmail")?;
    let notion = ServiceName::new("notion")?;
    let websocket = ServiceName::new("websocket")?;
    let built = AgentRegistry::builder()
        .register(AgentDescriptor::new(gmail.clone(), release), book_factory(book))
        .and_then(|builder| builder.register(AgentDescriptor::new(notion, release), book_factory(book)))
        .and_then(|builder| {
            builder.register(
                AgentDescriptor::new(websocket, release).with_dependency(gmail, release),
                book_factory(book),
            )
        })
        .and_then(AgentRegistryBuilder::build)?;
    Ok(built)
}

impl LifecycleWorld {
    /// Creates a world whose agents retry within milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error when the registry cannot be built.
    pub fn new() -> Result<Self, eyre::Report> {
        let settings = RuntimeSettings {
            supervisor: SupervisorSettings {
                hook_timeout_ms: 500,
                stop_grace_ms: 500,
                ..SupervisorSettings::default()
            },
            retry: RetrySettings {
                base_delay_ms: 1,
                max_delay_ms: 5,
                ..RetrySettings::default()
            },
            ..RuntimeSettings::default()
        };
        let agents = AgentBook::default();
        let catalog = Arc::new(registry(&agents)?);
        let config = Arc::new(InMemoryConfigProvider::new(catalog.schema_catalog()));
        let context = Arc::new(RuntimeContext::in_memory(settings, Arc::new(DefaultClock)));
        let supervisor = Supervisor::new(catalog, Arc::clone(&config) as Arc<dyn ConfigProvider>, context);
        Ok(Self {
            supervisor: Arc::new(supervisor),
            config,
            last_error: None,
            agents,
        })
    }

    /// Returns the scripted agent for `agent_key`.
    pub fn agent(&self, agent_key: &AgentKey) -> Arc<ScriptedAgent> {
        let mut known = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            known
                .entry(agent_key.clone())
                .or_insert_with(|| Arc::new(ScriptedAgent::default())),
        )
    }

    /// Polls until the status of `agent_key` satisfies `accept`.
    pub fn wait_for(
        &self,
        agent_key: &AgentKey,
        accept: impl Fn(&AgentStatus) -> bool,
    ) -> Result<AgentStatus, eyre::Report> {
        run_async(async {
            for _ in 0..300 {
                if let Some(status) = self.supervisor.status(agent_key)
                    && accept(&status)
                {
                    return Ok(status);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Err(eyre!("{agent_key} never reached the expected status"))
        })
    }
}

/// Parses `owner/service` into an agent key.
pub fn parse_key(text: &str) -> Result<AgentKey, eyre::Report> {
    let (owner, service) = text
        .split_once('/')
        .ok_or_else(|| eyre!("expected owner/service, got '{text}'"))?;
    Ok(AgentKey::from_parts(owner, service)?)
}

/// Fixture that creates a new scenario world.
///
/// # Panics
///
/// Panics when the scripted registry cannot be built.
#[fixture]
pub fn world() -> LifecycleWorld {
    LifecycleWorld::new().expect("scripted registry builds")
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
