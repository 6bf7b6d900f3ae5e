//! Event topic names.

use super::EventDomainError;
use crate::agent::domain::ServiceName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic published when a subscriber handler fails.
pub const SUBSCRIBER_ERROR_TOPIC: &str = "subscriber_error";
/// Topic published when an instance is given up on.
pub const AGENT_FAILED_TOPIC: &str = "agent.failed";
/// Topic published on every supervisor health pass.
pub const HEALTH_TICK_TOPIC: &str = "supervisor.health.tick";

/// Dot-separated topic such as `gmail.inbox.classify`.
///
/// Subscriptions match topics exactly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Creates a validated topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventDomainError`] when the topic is empty, contains
    /// characters outside `[a-z0-9_.-]`, or has an empty segment.
    pub fn new(value: impl Into<String>) -> Result<Self, EventDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(EventDomainError::EmptyTopic);
        }
        let valid_segments = normalized.split('.').all(|segment| {
            !segment.is_empty()
                && segment.chars().all(|character| {
                    character.is_ascii_lowercase()
                        || character.is_ascii_digit()
                        || matches!(character, '_' | '-')
                })
        });
        if !valid_segments {
            return Err(EventDomainError::InvalidTopic(normalized));
        }
        Ok(Self(normalized))
    }

    /// Builds `<service>.<noun>.<verb>` from a validated service name and
    /// static lowercase segments.
    #[must_use]
    pub fn service_scoped(service: &ServiceName, noun: &'static str, verb: &'static str) -> Self {
        Self(format!("{service}.{noun}.{verb}"))
    }

    /// Returns the `subscriber_error` topic.
    #[must_use]
    pub fn subscriber_error() -> Self {
        Self(SUBSCRIBER_ERROR_TOPIC.to_owned())
    }

    /// Returns the `agent.failed` topic.
    #[must_use]
    pub fn agent_failed() -> Self {
        Self(AGENT_FAILED_TOPIC.to_owned())
    }

    /// Returns the `supervisor.health.tick` topic.
    #[must_use]
    pub fn health_tick() -> Self {
        Self(HEALTH_TICK_TOPIC.to_owned())
    }

    /// Returns the topic as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether this is the topic failures are reported on.
    #[must_use]
    pub fn is_subscriber_error(&self) -> bool {
        self.0 == SUBSCRIBER_ERROR_TOPIC
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<String> for Topic {
    type Error = EventDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Topic {
    type Error = EventDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}
