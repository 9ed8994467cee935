//! Offline notification queue.
//!
//! Notifications for users with no live connection are appended to a
//! per-user list and replayed, oldest first, on the user's next connection.
//!
//! The queue is best-effort. Every store call runs under a timeout, and a
//! failed or slow store only means "nothing queued" or "nothing replayed";
//! errors never reach the caller.
//!
//! Replay reads the list and deletes it in two separate calls. A notification
//! enqueued between the read and the delete is lost. The user is already
//! registered as online while replay runs, so a notification sent during
//! replay is delivered live and can reach the client ahead of older queued
//! ones.
//!
//! The list is only deleted once every entry was handed to the connection.
//! If the connection goes away mid-replay the list is kept, and the entries
//! already emitted are replayed again on the next connection.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::realtime::{Notification, QueuedNotification};
use crate::ports::{NotificationStore, StoreError};

/// Queued notifications expire after 7 days.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default upper bound for a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Settings for [`NotificationQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationQueueConfig {
    pub ttl: Duration,
    pub store_timeout: Duration,
}

impl Default for NotificationQueueConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_NOTIFICATION_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Store-backed queue of notifications for offline users.
#[derive(Clone)]
pub struct NotificationQueue {
    store: Arc<dyn NotificationStore>,
    config: NotificationQueueConfig,
}

impl NotificationQueue {
    pub fn new(store: Arc<dyn NotificationStore>, config: NotificationQueueConfig) -> Self {
        Self { store, config }
    }

    pub fn with_defaults(store: Arc<dyn NotificationStore>) -> Self {
        Self::new(store, NotificationQueueConfig::default())
    }

    pub fn config(&self) -> &NotificationQueueConfig {
        &self.config
    }

    /// Append a notification to the user's queue and refresh its expiry.
    ///
    /// Returns `true` if the entry was stored. Failures are logged.
    pub async fn enqueue(&self, user_id: &UserId, notification: Notification) -> bool {
        let queued = notification.queued_at(Timestamp::now());
        let entry = match serde_json::to_string(&queued) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to serialize notification");
                return false;
            }
        };

        let pushed = self
            .guarded("push_back", self.store.push_back(user_id, entry))
            .await;
        if let Err(e) = pushed {
            tracing::error!(user_id = %user_id, error = %e, "Failed to enqueue notification");
            return false;
        }

        if let Err(e) = self
            .guarded("expire", self.store.expire(user_id, self.config.ttl))
            .await
        {
            // The entry is stored; only its expiry refresh was lost.
            tracing::warn!(user_id = %user_id, error = %e, "Failed to refresh queue expiry");
        }

        tracing::debug!(user_id = %user_id, "Notification queued for offline user");
        true
    }

    /// Emit every queued notification in insertion order, then clear the queue.
    ///
    /// `emit` resolves to `false` when the entry could not be handed over; replay
    /// stops there and the queue is kept. Entries that fail to parse are
    /// skipped. Returns the number emitted. An unreachable store replays
    /// nothing and keeps the queue.
    pub async fn replay<F, Fut>(&self, user_id: &UserId, mut emit: F) -> usize
    where
        F: FnMut(QueuedNotification) -> Fut,
        Fut: Future<Output = bool>,
    {
        let entries = match self.guarded("read_all", self.store.read_all(user_id)).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Skipping notification replay");
                return 0;
            }
        };

        if entries.is_empty() {
            return 0;
        }

        let mut emitted = 0;
        for entry in &entries {
            let queued = match serde_json::from_str::<QueuedNotification>(entry) {
                Ok(queued) => queued,
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Dropping unreadable queued notification");
                    continue;
                }
            };
            if !emit(queued).await {
                tracing::warn!(
                    user_id = %user_id,
                    emitted,
                    queued = entries.len(),
                    "Replay interrupted, keeping queued notifications"
                );
                return emitted;
            }
            emitted += 1;
        }

        if let Err(e) = self.guarded("delete", self.store.delete(user_id)).await {
            tracing::error!(user_id = %user_id, error = %e, "Failed to clear replayed notifications");
        }

        tracing::info!(user_id = %user_id, count = emitted, "Replayed queued notifications");
        emitted
    }

    async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, "Notification store call timed out");
                Err(StoreError::Timeout(self.config.store_timeout))
            }
        }
    }
}
