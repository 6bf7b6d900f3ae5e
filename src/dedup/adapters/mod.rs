//! Adapter implementations for the processed-item ledger.

pub mod memory;

pub use memory::InMemoryDedupLedger;
