//! Adapter implementations for agent collaborator ports.

pub mod memory;
