//! Typed registry mapping service names to agent factories.
//!
//! Registration happens once at process start through
//! [`AgentRegistryBuilder`]; [`AgentRegistryBuilder::build`] rejects missing,
//! incompatible, or cyclic dependencies. The resulting [`AgentRegistry`] is
//! never mutated afterwards.

mod catalog;
mod error;
mod factory;

pub use catalog::{AgentRegistry, AgentRegistryBuilder};
pub use error::{RegistryError, RegistryResult};
pub use factory::AgentFactory;

#[cfg(test)]
mod tests;
