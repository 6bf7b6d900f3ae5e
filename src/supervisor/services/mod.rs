//! Supervisor services.

mod supervisor;

pub use supervisor::Supervisor;
