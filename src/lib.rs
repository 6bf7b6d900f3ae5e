//! Agentmate: multi-tenant agent lifecycle and event-coordination runtime.
//!
//! For every (owner, service) pair the runtime keeps an isolated agent that
//! periodically fetches work from an external source, filters items it has
//! already handled, runs them through pluggable processing engines, and
//! dispatches the results. Agents never reference each other; they publish
//! lifecycle and result events on a shared bus.
//!
//! # Architecture
//!
//! Agentmate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external collaborators
//! - **Adapters**: Concrete implementations of ports (in-memory, files)
//! - **Services**: Run-loops and coordination built on the ports
//!
//! # Modules
//!
//! - [`agent`]: Agent identity, state machine, operating cycle, and run-loop
//! - [`config`]: Per-agent configuration schemas and runtime settings
//! - [`dedup`]: Ledger of processed work items
//! - [`event_bus`]: Publish/subscribe with ordered, isolated delivery
//! - [`registry`]: Typed service-name to agent-factory map
//! - [`resilience`]: Retry with backoff and per-key rate limiting
//! - [`supervisor`]: Dependency-ordered start, health checks, and restarts
//! - [`context`]: Process-scoped collaborators shared by every component

pub mod agent;
pub mod config;
pub mod context;
pub mod dedup;
pub mod event_bus;
pub mod graph;
pub mod registry;
pub mod resilience;
pub mod supervisor;

pub use context::RuntimeContext;
