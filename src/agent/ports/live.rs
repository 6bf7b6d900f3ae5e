//! Live-update channel port.

use crate::agent::domain::OwnerId;
use crate::event_bus::domain::Event;
use async_trait::async_trait;
use thiserror::Error;

/// Failure to push a live update. Logged, never fatal to a cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("live channel failure: {0}")]
pub struct LiveChannelError(pub String);

/// Best-effort push of events to an owner's connected client.
#[async_trait]
pub trait LiveChannel: Send + Sync {
    /// Pushes `event` to `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LiveChannelError`] when the push fails or no client is
    /// connected.
    async fn notify(&self, owner: &OwnerId, event: &Event) -> Result<(), LiveChannelError>;
}
