//! Supervisor wired to scripted agents and in-memory adapters.

use crate::agent::{
    adapters::memory::ScriptedAgent,
    domain::{AgentDescriptor, AgentKey, AgentStatus, AgentVersion, ServiceName},
    ports::{Agent, AgentHookError},
};
use crate::config::{
    adapters::InMemoryConfigProvider,
    domain::{AgentConfig, ConfigValues, RestartSettings, RetrySettings, RuntimeSettings, SupervisorSettings},
    ports::ConfigProvider,
};
use crate::context::RuntimeContext;
use crate::registry::{AgentFactory, AgentRegistry, AgentRegistryBuilder};
use crate::supervisor::Supervisor;
use eyre::{Result, bail};
use mockable::DefaultClock;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type AgentBook = Arc<Mutex<BTreeMap<AgentKey, Arc<ScriptedAgent>>>>;

pub(super) fn key(owner: &str, service: &str) -> AgentKey {
    AgentKey::from_parts(owner, service).expect("valid agent key")
}

pub(super) fn fast_settings() -> RuntimeSettings {
    RuntimeSettings {
        supervisor: SupervisorSettings {
            hook_timeout_ms: 500,
            stop_grace_ms: 500,
            init_max_attempts: 1,
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

fn service(name: &str) -> ServiceName {
    ServiceName::new(name).expect("valid service name")
}

pub(super) fn registry(book: &AgentBook) -> AgentRegistry {
    let release = AgentVersion::new(1, 0, 0);
    AgentRegistry::builder()
        .register(AgentDescriptor::new(service("gmail"), release), book_factory(book))
        .and_then(|builder| builder.register(AgentDescriptor::new(service("notion"), release), book_factory(book)))
        .and_then(|builder| {
            builder.register(
                AgentDescriptor::new(service("websocket"), release).with_dependency(service("gmail"), release),
                book_factory(book),
            )
        })
        .and_then(AgentRegistryBuilder::build)
        .expect("registry builds")
}

pub(super) struct Harness {
    pub(super) supervisor: Arc<Supervisor<DefaultClock>>,
    pub(super) config: Arc<InMemoryConfigProvider>,
    agents: AgentBook,
}

impl Harness {
    pub(super) fn new(settings: RuntimeSettings) -> Self {
        let agents = AgentBook::default();
        let catalog = Arc::new(registry(&agents));
        let config = Arc::new(InMemoryConfigProvider::new(catalog.schema_catalog()));
        let context = Arc::new(RuntimeContext::in_memory(settings, Arc::new(DefaultClock)));
        let supervisor = Supervisor::new(catalog, Arc::clone(&config) as Arc<dyn ConfigProvider>, context);
        Self {
            supervisor: Arc::new(supervisor),
            config,
            agents,
        }
    }

    /// Returns the agent the factory hands out for `agent_key`.
    pub(super) fn agent(&self, agent_key: &AgentKey) -> Arc<ScriptedAgent> {
        let mut known = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            known
                .entry(agent_key.clone())
                .or_insert_with(|| Arc::new(ScriptedAgent::default())),
        )
    }

    pub(super) async fn configure(&self, agent_key: &AgentKey, values: ConfigValues) -> Result<()> {
        self.config.put(agent_key, values).await?;
        Ok(())
    }

    pub(super) async fn wait_for(
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
        bail!("{agent_key} never reached the expected status: {:?}", self.supervisor.status(agent_key))
    }
}
