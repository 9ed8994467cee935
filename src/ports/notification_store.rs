//! Notification store port - per-user ordered lists with expiry.
//!
//! The offline notification queue is built on four list primitives so that
//! Redis and the in-memory store behave the same way.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::UserId;

/// Storage for queued notifications, one ordered list per user.
///
/// Entries are opaque JSON strings; the application layer owns the format.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Append an entry to the tail of the user's list.
    async fn push_back(&self, user_id: &UserId, entry: String) -> Result<(), StoreError>;

    /// Set (or refresh) the expiry of the user's list.
    async fn expire(&self, user_id: &UserId, ttl: Duration) -> Result<(), StoreError>;

    /// Read the whole list, oldest first. Missing lists read as empty.
    async fn read_all(&self, user_id: &UserId) -> Result<Vec<String>, StoreError>;

    /// Remove the user's list.
    async fn delete(&self, user_id: &UserId) -> Result<(), StoreError>;
}

/// Errors from the notification store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend unreachable or the command failed.
    #[error("notification store unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within the configured timeout.
    #[error("notification store timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
