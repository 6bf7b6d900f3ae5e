//! Services built on the event bus port.

pub mod idempotent;
pub mod subscriber_manager;

pub use idempotent::IdempotentHandler;
pub use subscriber_manager::{SubscriberManager, SubscriberManagerError, SubscriberManagerResult};
