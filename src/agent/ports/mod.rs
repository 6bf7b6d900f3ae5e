//! Port contracts for agent collaborators.

pub mod agent;
pub mod engine;
pub mod live;
pub mod sink;
pub mod source;

pub use agent::{Agent, AgentHookError};
pub use engine::{EngineError, ProcessingEngine};
pub use live::{LiveChannel, LiveChannelError};
pub use sink::{Sink, SinkError};
pub use source::{DataSourceClient, SourceError};

#[cfg(test)]
pub use sink::MockSink;
#[cfg(test)]
pub use source::MockDataSourceClient;
