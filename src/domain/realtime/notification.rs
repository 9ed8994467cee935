//! Notifications pushed to users, live or via the offline queue.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::Timestamp;

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Notification {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Stamp for storage in the offline queue.
    pub fn queued_at(self, at: Timestamp) -> QueuedNotification {
        QueuedNotification {
            notification: self,
            queued_at: at,
        }
    }
}

/// A notification persisted while its recipient was offline.
///
/// Serialized flat: `{"type", "message", "payload", "queuedAt"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedNotification {
    #[serde(flatten)]
    pub notification: Notification,
    pub queued_at: Timestamp,
}
