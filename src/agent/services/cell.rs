//! Shared, observable holder for one agent instance.

use crate::agent::domain::{AgentInstance, AgentState, AgentStatus};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Holds an [`AgentInstance`] shared by its run-loop and the supervisor.
///
/// The run-loop applies transitions through [`InstanceCell::update`]; every
/// update republishes the lifecycle state so waiters can observe it without
/// polling. The lock is never held across an await point.
#[derive(Debug)]
pub struct InstanceCell {
    instance: Mutex<AgentInstance>,
    state: watch::Sender<AgentState>,
}

impl InstanceCell {
    /// Wraps `instance`.
    #[must_use]
    pub fn new(instance: AgentInstance) -> Self {
        let (state, _) = watch::channel(instance.state());
        Self {
            instance: Mutex::new(instance),
            state,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AgentInstance> {
        self.instance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `change` and publishes the resulting state.
    pub fn update<R>(&self, change: impl FnOnce(&mut AgentInstance) -> R) -> R {
        let mut instance = self.lock();
        let outcome = change(&mut instance);
        self.state.send_replace(instance.state());
        outcome
    }

    /// Returns a copy of the instance.
    #[must_use]
    pub fn snapshot(&self) -> AgentInstance {
        self.lock().clone()
    }

    /// Returns a status snapshot.
    #[must_use]
    pub fn status(&self) -> AgentStatus {
        self.lock().status()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    /// Waits up to `timeout` for a state satisfying `accept`, returning the
    /// state observed last.
    pub async fn wait_for_state(
        &self,
        timeout: Duration,
        accept: impl Fn(AgentState) -> bool,
    ) -> AgentState {
        let mut receiver = self.state.subscribe();
        let outcome = tokio::time::timeout(timeout, receiver.wait_for(|state| accept(*state))).await;
        match outcome {
            Ok(Ok(state)) => *state,
            Ok(Err(_)) | Err(_) => self.state(),
        }
    }
}
