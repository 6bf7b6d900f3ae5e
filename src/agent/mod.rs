//! Agent instances and their operating cycle.
//!
//! Each (owner, service) pair runs one isolated agent. The context follows
//! the hexagonal layout:
//!
//! - Identity, state machine, and work item types in [`domain`]
//! - Collaborator contracts (`Agent`, `DataSourceClient`,
//!   `ProcessingEngine`, `Sink`, `LiveChannel`) in [`ports`]
//! - In-memory collaborators in [`adapters`]
//! - The cycle executor and run-loop in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
