//! Unit tests for the supervisor context.

mod harness;
