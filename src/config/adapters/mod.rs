//! Adapter implementations for configuration ports and settings files.

pub mod file;
pub mod memory;

pub use file::load_settings;
pub use memory::InMemoryConfigProvider;
