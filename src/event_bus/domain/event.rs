//! Immutable published events.

use super::{EventId, Topic};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event as delivered to subscribers. Never mutated after publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    id: EventId,
    topic: Topic,
    payload: Value,
    emitted_at: DateTime<Utc>,
    source: Option<String>,
    correlation_id: Option<EventId>,
}

impl Event {
    /// Creates an event stamped with the current clock time.
    #[must_use]
    pub fn new(topic: Topic, payload: Value, clock: &impl Clock) -> Self {
        Self {
            id: EventId::new(),
            topic,
            payload,
            emitted_at: clock.utc(),
            source: None,
            correlation_id: None,
        }
    }

    /// Creates an event from a serializable payload.
    ///
    /// # Errors
    ///
    /// Returns the serialization error when `payload` cannot be represented
    /// as JSON.
    pub fn from_payload<T: Serialize>(
        topic: Topic,
        payload: &T,
        clock: &impl Clock,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(topic, serde_json::to_value(payload)?, clock))
    }

    /// Names the component that published the event.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Links the event to the event that caused it.
    #[must_use]
    pub const fn with_correlation_id(mut self, correlation_id: EventId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Returns the event identity.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Returns the topic.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns the raw payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Deserializes the payload.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error when the payload does not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Returns the publication timestamp.
    #[must_use]
    pub const fn emitted_at(&self) -> DateTime<Utc> {
        self.emitted_at
    }

    /// Returns the publishing component, if named.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Returns the causing event, if any.
    #[must_use]
    pub const fn correlation_id(&self) -> Option<EventId> {
        self.correlation_id
    }
}
