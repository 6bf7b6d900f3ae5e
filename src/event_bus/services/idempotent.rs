//! Consumer-side duplicate suppression for at-least-once transports.

use crate::event_bus::{
    domain::{Event, EventId},
    ports::{EventHandler, HandlerError},
};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct SeenWindow {
    order: VecDeque<EventId>,
    ids: HashSet<EventId>,
}

impl SeenWindow {
    fn claim(&mut self, id: EventId, capacity: usize) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }

    fn release(&mut self, id: EventId) {
        if self.ids.remove(&id) {
            self.order.retain(|seen| *seen != id);
        }
    }
}

/// Wraps a handler so each event identity is handled at most once within a
/// bounded window of recent events.
///
/// A failed delivery releases its claim so a redelivery can retry.
pub struct IdempotentHandler {
    inner: Arc<dyn EventHandler>,
    capacity: usize,
    seen: Mutex<SeenWindow>,
}

impl IdempotentHandler {
    /// Wraps `inner`, remembering the last `capacity` event identities.
    #[must_use]
    pub fn new(inner: Arc<dyn EventHandler>, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            seen: Mutex::default(),
        }
    }

    /// Wraps `inner` and returns it as a shareable handler.
    #[must_use]
    pub fn wrap(inner: Arc<dyn EventHandler>, capacity: usize) -> Arc<dyn EventHandler> {
        Arc::new(Self::new(inner, capacity))
    }

    fn window(&self) -> Result<std::sync::MutexGuard<'_, SeenWindow>, HandlerError> {
        self.seen
            .lock()
            .map_err(|err| HandlerError::new(format!("idempotency window poisoned: {err}")))
    }
}

#[async_trait]
impl EventHandler for IdempotentHandler {
    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let claimed = self.window()?.claim(event.id(), self.capacity);
        if !claimed {
            tracing::debug!(event_id = %event.id(), topic = %event.topic(), "skipping duplicate delivery");
            return Ok(());
        }
        let outcome = self.inner.handle(event).await;
        if outcome.is_err() {
            self.window()?.release(event.id());
        }
        outcome
    }
}
