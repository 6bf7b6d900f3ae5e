//! Port contracts for the processed-item ledger.

pub mod ledger;

pub use ledger::{DedupError, DedupLedger, DedupResult};
