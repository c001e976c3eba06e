//! Logout broadcast registry.
//!
//! Code that notices an authentication failure (typically an HTTP wrapper
//! receiving a 401) publishes an [`ExpiryReason`] here without holding a
//! reference to the [`SessionManager`](crate::SessionManager). The manager
//! registers itself as a subscriber and performs the actual logout.
//!
//! The registry is an explicit handle created by the composition root and
//! cloned into every collaborator that needs it.

use parking_lot::RwLock;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use uuid::Uuid;

use crate::session::ExpiryReason;

type LogoutCallback = Arc<dyn Fn(ExpiryReason) + Send + Sync>;

/// Identifies one registration; pass it back to [`LogoutBroadcast::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

#[derive(Clone, Default)]
pub struct LogoutBroadcast {
    subscribers: Arc<RwLock<Vec<(SubscriptionId, LogoutCallback)>>>,
}

impl fmt::Debug for LogoutBroadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogoutBroadcast")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl LogoutBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber. Subscribers run in registration order.
    pub fn register<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ExpiryReason) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscribers.write().push((id, Arc::new(callback)));
        tracing::debug!("Registered logout subscriber {:?}", id);
        id
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        let removed = subscribers.len() != before;
        if removed {
            tracing::debug!("Unregistered logout subscriber {:?}", id);
        }
        removed
    }

    /// Invokes every subscriber with `reason`, synchronously.
    ///
    /// The subscriber list is snapshotted first, so callbacks may register or
    /// unregister while the publish is running. A panicking subscriber is
    /// logged and skipped.
    pub fn publish(&self, reason: ExpiryReason) {
        let snapshot: Vec<(SubscriptionId, LogoutCallback)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        if snapshot.is_empty() {
            tracing::debug!("Logout requested ({}) but nobody is listening", reason);
            return;
        }

        tracing::info!(
            "Broadcasting logout request ({}) to {} subscriber(s)",
            reason,
            snapshot.len()
        );

        for (id, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(reason))).is_err() {
                tracing::error!("Logout subscriber {:?} panicked while handling {}", id, reason);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
