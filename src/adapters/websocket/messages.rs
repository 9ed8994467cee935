//! WebSocket message types for the real-time gateway.
//!
//! Every frame in both directions is a JSON envelope:
//!
//! ```text
//! { "event": "<name>", "data": { ... } }
//! ```
//!
//! - Server → Client: connection status, data updates, notifications,
//!   presence, room membership, chat traffic and errors
//! - Client → Server: the six inbound events, validated by `EventValidator`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{ConnectionId, Timestamp, UserId};
use crate::domain::realtime::{Notification, QueuedNotification};

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Connection established and registered.
    #[serde(rename = "connected")]
    Connected(ConnectedMessage),

    /// A record of a subscribed entity changed.
    #[serde(rename = "data:updated")]
    DataUpdated(DataUpdatedMessage),

    /// Live or replayed notification.
    #[serde(rename = "notification")]
    Notification(NotificationMessage),

    /// A user's first connection opened.
    #[serde(rename = "user:online")]
    UserOnline(PresenceMessage),

    /// A user's last connection closed.
    #[serde(rename = "user:offline")]
    UserOffline(PresenceMessage),

    /// The connection joined a room.
    #[serde(rename = "room:joined")]
    RoomJoined(RoomMessage),

    /// The connection left a room.
    #[serde(rename = "room:left")]
    RoomLeft(RoomMessage),

    /// Another member of a room is typing.
    #[serde(rename = "user:typing")]
    UserTyping(TypingMessage),

    /// Chat message posted to a room.
    #[serde(rename = "message:new")]
    MessageNew(ChatMessage),

    /// An inbound event failed validation.
    #[serde(rename = "validation:error")]
    ValidationError(ValidationErrorMessage),

    /// Any other failure reported to the client.
    #[serde(rename = "error")]
    Error(ErrorMessage),
}

impl ServerMessage {
    /// Wire name of this message.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::Connected(_) => "connected",
            ServerMessage::DataUpdated(_) => "data:updated",
            ServerMessage::Notification(_) => "notification",
            ServerMessage::UserOnline(_) => "user:online",
            ServerMessage::UserOffline(_) => "user:offline",
            ServerMessage::RoomJoined(_) => "room:joined",
            ServerMessage::RoomLeft(_) => "room:left",
            ServerMessage::UserTyping(_) => "user:typing",
            ServerMessage::MessageNew(_) => "message:new",
            ServerMessage::ValidationError(_) => "validation:error",
            ServerMessage::Error(_) => "error",
        }
    }

    pub fn connected(connection_id: ConnectionId, user_id: &UserId) -> Self {
        ServerMessage::Connected(ConnectedMessage {
            connection_id: connection_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: now(),
        })
    }

    pub fn data_updated(entity: impl Into<String>, data: Value) -> Self {
        ServerMessage::DataUpdated(DataUpdatedMessage {
            entity: entity.into(),
            data,
            timestamp: now(),
        })
    }

    pub fn notification(notification: Notification) -> Self {
        ServerMessage::Notification(NotificationMessage {
            notification,
            queued_at: None,
            timestamp: now(),
        })
    }

    pub fn replayed_notification(queued: QueuedNotification) -> Self {
        ServerMessage::Notification(NotificationMessage {
            notification: queued.notification,
            queued_at: Some(queued.queued_at.to_rfc3339()),
            timestamp: now(),
        })
    }

    pub fn user_online(user_id: &UserId) -> Self {
        ServerMessage::UserOnline(PresenceMessage::new(user_id, PresenceStatus::Online))
    }

    pub fn user_offline(user_id: &UserId) -> Self {
        ServerMessage::UserOffline(PresenceMessage::new(user_id, PresenceStatus::Offline))
    }

    pub fn room_joined(room_id: impl Into<String>) -> Self {
        ServerMessage::RoomJoined(RoomMessage {
            room_id: room_id.into(),
        })
    }

    pub fn room_left(room_id: impl Into<String>) -> Self {
        ServerMessage::RoomLeft(RoomMessage {
            room_id: room_id.into(),
        })
    }

    pub fn validation_error(event: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::ValidationError(ValidationErrorMessage {
            event: event.into(),
            message: "Invalid event payload".to_string(),
            error: message.into(),
            timestamp: now(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            message: message.into(),
        })
    }

    /// Serialize to the JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn now() -> String {
    Timestamp::now().to_rfc3339()
}

/// Sent once the connection is registered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub connection_id: String,
    pub user_id: String,
    pub timestamp: String,
}

/// Entity change pushed to data room subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataUpdatedMessage {
    pub entity: String,
    pub data: Value,
    pub timestamp: String,
}

/// Notification body plus delivery timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    #[serde(flatten)]
    pub notification: Notification,
    /// Present when delivered from the offline queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Presence change broadcast to every connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMessage {
    pub user_id: String,
    pub status: PresenceStatus,
    pub timestamp: String,
}

impl PresenceMessage {
    fn new(user_id: &UserId, status: PresenceStatus) -> Self {
        Self {
            user_id: user_id.to_string(),
            status,
            timestamp: now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessage {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingMessage {
    pub user_id: String,
    pub room_id: String,
    pub is_typing: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub room_id: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub metadata: Option<Value>,
    pub timestamp: String,
}

/// Validation failure for one inbound event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationErrorMessage {
    pub event: String,
    pub message: String,
    pub error: String,
    pub timestamp: String,
}

/// Error message sent to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessage {
    pub message: String,
}

// ============================================
// Client → Server Messages
// ============================================

/// Envelope of every client frame. The payload stays raw JSON until the
/// validator has checked it.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
