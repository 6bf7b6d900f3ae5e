//! Publish/subscribe coordination between agents and independent listeners.
//!
//! The bus is constructed once per process and passed explicitly to the
//! components that publish or subscribe. The module follows the hexagonal
//! layout:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Subscriber lifecycle and consumer helpers in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
