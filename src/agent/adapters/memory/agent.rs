//! Agent assembled from in-memory collaborators.

use super::{EchoEngine, RecordingSink, ScriptedSource};
use crate::agent::ports::{Agent, AgentHookError, DataSourceClient, ProcessingEngine, Sink};
use crate::config::domain::AgentConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Agent wired to scripted collaborators, with scriptable hook failures.
///
/// Clones of the collaborator handles stay valid across restarts, so tests
/// can observe every instance a factory builds from the same parts.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    source: Arc<ScriptedSource>,
    engine: Arc<EchoEngine>,
    sink: Arc<RecordingSink>,
    failing_initializations: AtomicU32,
    initializations: AtomicUsize,
    stops: AtomicUsize,
    stop_delay_ms: AtomicU32,
}

impl ScriptedAgent {
    /// Creates an agent around the given collaborators.
    #[must_use]
    pub fn new(source: Arc<ScriptedSource>, engine: Arc<EchoEngine>, sink: Arc<RecordingSink>) -> Self {
        Self {
            source,
            engine,
            sink,
            ..Self::default()
        }
    }

    /// Makes the next `count` initializations fail.
    pub fn fail_initializations(&self, count: u32) {
        self.failing_initializations.store(count, Ordering::SeqCst);
    }

    /// Delays the stop hook.
    pub fn set_stop_delay(&self, delay: Duration) {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        self.stop_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Returns the scripted source.
    #[must_use]
    pub fn scripted_source(&self) -> &Arc<ScriptedSource> {
        &self.source
    }

    /// Returns the echo engine.
    #[must_use]
    pub fn echo_engine(&self) -> &Arc<EchoEngine> {
        &self.engine
    }

    /// Returns the recording sink.
    #[must_use]
    pub fn recording_sink(&self) -> &Arc<RecordingSink> {
        &self.sink
    }

    /// Returns how many times initialize ran.
    #[must_use]
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Returns how many times stop ran.
    #[must_use]
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn initialize(&self, _config: &AgentConfig) -> Result<(), AgentHookError> {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_initializations.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_initializations
                .store(remaining.saturating_sub(1), Ordering::SeqCst);
            return Err(AgentHookError::new("initialization refused"));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), AgentHookError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let delay = self.stop_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(u64::from(delay))).await;
        }
        Ok(())
    }

    fn source(&self) -> Arc<dyn DataSourceClient> {
        Arc::clone(&self.source) as Arc<dyn DataSourceClient>
    }

    fn engine(&self) -> Arc<dyn ProcessingEngine> {
        Arc::clone(&self.engine) as Arc<dyn ProcessingEngine>
    }

    fn sink(&self) -> Arc<dyn Sink> {
        Arc::clone(&self.sink) as Arc<dyn Sink>
    }
}
