//! Domain model for agent instances and their operating cycle.
//!
//! The agent domain models identity, versioned descriptors, the lifecycle
//! state machine, work items, and processing results. Runtime concerns such
//! as scheduling and cancellation live in the services layer.

mod descriptor;
mod error;
mod ids;
mod instance;
mod lifecycle;
mod processing;
mod state;
mod version;
mod work_item;

pub use descriptor::AgentDescriptor;
pub use error::{AgentDomainError, ParseAgentStateError};
pub use ids::{AgentKey, CycleId, OwnerId, ServiceName};
pub use instance::{AgentFailure, AgentInstance, AgentStatus, FailureKind};
pub use lifecycle::{
    LifecyclePayload, LifecycleStatus, LifecycleVerb, cycle_completed_topic, item_processed_topic,
};
pub use processing::{EngineKind, EngineOutput, ProcessedItem, ProcessingMode};
pub use state::{AgentHealth, AgentState};
pub use version::AgentVersion;
pub use work_item::{ExternalId, FetchBatch, FetchCursor, WorkItem};
