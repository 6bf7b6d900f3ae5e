//! Domain model for the processed-item ledger.

mod record;

pub use record::{DedupKey, DedupRecord};
