//! Subscriber plugin port.

use super::{HandlerError, SubscriptionRequest};
use async_trait::async_trait;

/// An independent listener that registers subscriptions on start and
/// releases them on stop.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Returns the unique subscriber name.
    fn name(&self) -> &str;

    /// Returns the start priority; higher values start first among
    /// subscribers whose dependencies are satisfied.
    fn priority(&self) -> i32 {
        0
    }

    /// Returns the names of subscribers that must start before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Returns whether the subscriber starts without explicit enabling.
    fn enabled_by_default(&self) -> bool {
        true
    }

    /// Prepares the subscriber and returns the subscriptions to register.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when setup fails; the subscriber is then not
    /// started.
    async fn setup(&self) -> Result<Vec<SubscriptionRequest>, HandlerError>;

    /// Releases subscriber resources after its subscriptions are removed.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when teardown fails; the failure is logged.
    async fn stop(&self) -> Result<(), HandlerError> {
        Ok(())
    }
}
