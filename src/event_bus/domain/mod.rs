//! Domain model for the publish/subscribe bus.
//!
//! Events are immutable once published. The bus does not persist them;
//! delivery is best-effort to the subscriptions present at publish time.

mod error;
mod event;
mod failure;
mod ids;
mod topic;

pub use error::EventDomainError;
pub use event::Event;
pub use failure::SubscriberFailure;
pub use ids::{EventId, SubscriptionId};
pub use topic::{AGENT_FAILED_TOPIC, HEALTH_TICK_TOPIC, SUBSCRIBER_ERROR_TOPIC, Topic};
