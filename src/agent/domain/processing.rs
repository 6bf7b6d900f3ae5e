//! Processing modes and engine results.

use super::{AgentDomainError, AgentKey, CycleId, ExternalId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single processing engine an item can be routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Produces a condensed summary.
    Summarize,
    /// Assigns a category.
    Classify,
}

impl EngineKind {
    /// Returns the canonical representation, also used as a topic verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Classify => "classify",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Which engines an agent routes each item through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Summarize only.
    Summarize,
    /// Classify only.
    #[default]
    Classify,
    /// Summarize and classify concurrently; both must succeed.
    Both,
}

impl ProcessingMode {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Classify => "classify",
            Self::Both => "both",
        }
    }

    /// Returns the engines this mode fans out to.
    #[must_use]
    pub const fn kinds(self) -> &'static [EngineKind] {
        match self {
            Self::Summarize => &[EngineKind::Summarize],
            Self::Classify => &[EngineKind::Classify],
            Self::Both => &[EngineKind::Summarize, EngineKind::Classify],
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProcessingMode {
    type Error = AgentDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "summarize" | "summary" => Ok(Self::Summarize),
            "classify" => Ok(Self::Classify),
            "both" => Ok(Self::Both),
            _ => Err(AgentDomainError::InvalidProcessingMode(value.to_owned())),
        }
    }
}

/// Output of one engine call for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    /// Engine that produced the output.
    pub kind: EngineKind,
    /// Engine-specific structured result.
    pub value: Value,
}

impl EngineOutput {
    /// Creates an engine output.
    #[must_use]
    pub const fn new(kind: EngineKind, value: Value) -> Self {
        Self { kind, value }
    }
}

/// Fully processed item, ready for dispatch to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedItem {
    key: AgentKey,
    cycle_id: CycleId,
    external_id: ExternalId,
    outputs: Vec<EngineOutput>,
}

impl ProcessedItem {
    /// Creates a processed item.
    #[must_use]
    pub const fn new(
        key: AgentKey,
        cycle_id: CycleId,
        external_id: ExternalId,
        outputs: Vec<EngineOutput>,
    ) -> Self {
        Self {
            key,
            cycle_id,
            external_id,
            outputs,
        }
    }

    /// Returns the owning agent.
    #[must_use]
    pub const fn key(&self) -> &AgentKey {
        &self.key
    }

    /// Returns the cycle that produced the item.
    #[must_use]
    pub const fn cycle_id(&self) -> CycleId {
        self.cycle_id
    }

    /// Returns the upstream identifier.
    #[must_use]
    pub const fn external_id(&self) -> &ExternalId {
        &self.external_id
    }

    /// Returns engine outputs in mode order.
    #[must_use]
    pub fn outputs(&self) -> &[EngineOutput] {
        &self.outputs
    }

    /// Returns the output of `kind`, if present.
    #[must_use]
    pub fn output(&self, kind: EngineKind) -> Option<&Value> {
        self.outputs
            .iter()
            .find(|output| output.kind == kind)
            .map(|output| &output.value)
    }
}
