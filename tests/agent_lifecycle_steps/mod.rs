//! Step definitions for supervised agent lifecycle scenarios.

mod given;
mod then;
mod when;
pub mod world;
