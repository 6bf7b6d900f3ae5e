//! Port contracts for configuration persistence.

pub mod provider;

pub use provider::{ConfigProvider, ConfigProviderError, ConfigProviderResult};
