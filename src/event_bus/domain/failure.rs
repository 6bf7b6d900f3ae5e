//! Payload of `subscriber_error` events.

use super::{EventId, SubscriptionId, Topic};
use serde::{Deserialize, Serialize};

/// Describes a handler failure forwarded on `subscriber_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberFailure {
    /// Subscription whose handler failed.
    pub subscription_id: SubscriptionId,
    /// Topic of the event being handled.
    pub topic: Topic,
    /// Event being handled.
    pub event_id: EventId,
    /// Failure description.
    pub error: String,
}
