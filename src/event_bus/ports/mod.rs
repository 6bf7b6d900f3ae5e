//! Port contracts for publish/subscribe coordination.

pub mod bus;
pub mod handler;
pub mod subscriber;

pub use bus::{DeliveryReport, EventBus, EventBusError, EventBusResult, SubscriptionRequest};
pub use handler::{EventHandler, FnHandler, HandlerError, handler_fn};
pub use subscriber::Subscriber;
