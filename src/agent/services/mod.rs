//! Agent runtime services: control signalling, the cycle executor, and the
//! run-loop.

mod cell;
mod control;
mod cycle;
mod runner;

pub use cell::InstanceCell;
pub use control::{ControlHandle, ControlSignal, RunCommand, control_channel};
pub use cycle::{CycleError, CycleExecutor, CycleReport};
pub use runner::AgentRunner;
