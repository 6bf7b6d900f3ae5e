//! In-memory agent collaborators for tests and local runs.

mod agent;
mod collaborators;
mod live;

pub use agent::ScriptedAgent;
pub use collaborators::{EchoEngine, RecordingSink, ScriptedSource};
pub use live::RecordingLiveChannel;
