//! Recording live channel.

use super::collaborators::lock;
use crate::agent::{
    domain::OwnerId,
    ports::{LiveChannel, LiveChannelError},
};
use crate::event_bus::domain::{Event, Topic};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Live channel remembering each pushed (owner, topic) pair.
#[derive(Debug, Default)]
pub struct RecordingLiveChannel {
    pushed: Mutex<Vec<(OwnerId, Topic)>>,
    disconnected: AtomicBool,
}

impl RecordingLiveChannel {
    /// Creates a connected channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every push fail as if no client were connected.
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    /// Returns pushes so far.
    #[must_use]
    pub fn pushed(&self) -> Vec<(OwnerId, Topic)> {
        lock(&self.pushed).clone()
    }
}

#[async_trait]
impl LiveChannel for RecordingLiveChannel {
    async fn notify(&self, owner: &OwnerId, event: &Event) -> Result<(), LiveChannelError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(LiveChannelError(format!("no client connected for {owner}")));
        }
        lock(&self.pushed).push((owner.clone(), event.topic().clone()));
        Ok(())
    }
}
