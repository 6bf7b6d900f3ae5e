//! Identifier and validated-name types for agents.

use super::AgentDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length for a service name.
const MAX_SERVICE_NAME_LENGTH: usize = 64;

/// Maximum length for an owner identifier.
const MAX_OWNER_ID_LENGTH: usize = 128;

/// Identifier of the user that owns an agent instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates a validated owner identifier.
    ///
    /// The input is trimmed. Owner identifiers are opaque and case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::EmptyOwnerId`] or
    /// [`AgentDomainError::OwnerIdTooLong`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, AgentDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(AgentDomainError::EmptyOwnerId);
        }
        if normalized.len() > MAX_OWNER_ID_LENGTH {
            return Err(AgentDomainError::OwnerIdTooLong(normalized));
        }
        Ok(Self(normalized))
    }

    /// Returns the owner identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validated external-service name such as `gmail` or `notion`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a validated service name.
    ///
    /// The input is trimmed and lowercased. Only characters in `[a-z0-9_]`
    /// are accepted so the name can be used as an event-topic segment.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, AgentDomainError> {
        let normalized = value.into().trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(AgentDomainError::EmptyServiceName);
        }

        let is_valid = normalized.chars().all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
        });
        if !is_valid {
            return Err(AgentDomainError::InvalidServiceName(normalized));
        }

        if normalized.len() > MAX_SERVICE_NAME_LENGTH {
            return Err(AgentDomainError::ServiceNameTooLong(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the service name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identity of an agent instance: one per (owner, service) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentKey {
    owner: OwnerId,
    service: ServiceName,
}

impl AgentKey {
    /// Creates an agent key.
    #[must_use]
    pub const fn new(owner: OwnerId, service: ServiceName) -> Self {
        Self { owner, service }
    }

    /// Creates an agent key from raw strings.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError`] when either part fails validation.
    pub fn from_parts(
        owner: impl Into<String>,
        service: impl Into<String>,
    ) -> Result<Self, AgentDomainError> {
        Ok(Self::new(OwnerId::new(owner)?, ServiceName::new(service)?))
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Returns the external service.
    #[must_use]
    pub const fn service(&self) -> &ServiceName {
        &self.service
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.owner, self.service)
    }
}

/// Unique identifier of one agent operating cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(Uuid);

impl CycleId {
    /// Creates a new random cycle identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
