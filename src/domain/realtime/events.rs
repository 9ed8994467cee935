//! Inbound client events.
//!
//! Every event name a client may send maps to one [`EventKind`]; a payload
//! that passed validation becomes a typed [`InboundEvent`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use super::validation::EventValidationError;

/// Names of the client → server events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DataSubscribe,
    NotificationRead,
    UserTyping,
    RoomJoin,
    RoomLeave,
    MessageSend,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::DataSubscribe,
        EventKind::NotificationRead,
        EventKind::UserTyping,
        EventKind::RoomJoin,
        EventKind::RoomLeave,
        EventKind::MessageSend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DataSubscribe => "dataSubscribe",
            EventKind::NotificationRead => "notificationRead",
            EventKind::UserTyping => "userTyping",
            EventKind::RoomJoin => "roomJoin",
            EventKind::RoomLeave => "roomLeave",
            EventKind::MessageSend => "messageSend",
        }
    }

    /// Top-level payload fields this event keeps; everything else is stripped.
    pub fn known_fields(&self) -> &'static [&'static str] {
        match self {
            EventKind::DataSubscribe => &["entity", "filters"],
            EventKind::NotificationRead => &["notificationId"],
            EventKind::UserTyping => &["roomId", "isTyping"],
            EventKind::RoomJoin => &["roomId", "entity", "filters"],
            EventKind::RoomLeave => &["roomId"],
            EventKind::MessageSend => &["roomId", "message", "metadata"],
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventValidationError::UnknownEvent(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSubscribe {
    pub entity: String,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRead {
    pub notification_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    pub room_id: String,
    #[serde(default = "default_is_typing")]
    pub is_typing: bool,
}

fn default_is_typing() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoin {
    pub room_id: String,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomLeave {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSend {
    pub room_id: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// A validated, sanitized client event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    DataSubscribe(DataSubscribe),
    NotificationRead(NotificationRead),
    UserTyping(UserTyping),
    RoomJoin(RoomJoin),
    RoomLeave(RoomLeave),
    MessageSend(MessageSend),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::DataSubscribe(_) => EventKind::DataSubscribe,
            InboundEvent::NotificationRead(_) => EventKind::NotificationRead,
            InboundEvent::UserTyping(_) => EventKind::UserTyping,
            InboundEvent::RoomJoin(_) => EventKind::RoomJoin,
            InboundEvent::RoomLeave(_) => EventKind::RoomLeave,
            InboundEvent::MessageSend(_) => EventKind::MessageSend,
        }
    }

    /// Build the typed event from an already validated and sanitized payload.
    pub(crate) fn from_sanitized(kind: EventKind, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EventKind::DataSubscribe => InboundEvent::DataSubscribe(serde_json::from_value(data)?),
            EventKind::NotificationRead => {
                InboundEvent::NotificationRead(serde_json::from_value(data)?)
            }
            EventKind::UserTyping => InboundEvent::UserTyping(serde_json::from_value(data)?),
            EventKind::RoomJoin => InboundEvent::RoomJoin(serde_json::from_value(data)?),
            EventKind::RoomLeave => InboundEvent::RoomLeave(serde_json::from_value(data)?),
            EventKind::MessageSend => InboundEvent::MessageSend(serde_json::from_value(data)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        let err = "deleteEverything".parse::<EventKind>().unwrap_err();
        assert_eq!(err, EventValidationError::UnknownEvent("deleteEverything".to_string()));
    }

    #[test]
    fn typing_defaults_to_true() {
        let event =
            InboundEvent::from_sanitized(EventKind::UserTyping, json!({"roomId": "chat:x"})).unwrap();
        match event {
            InboundEvent::UserTyping(t) => assert!(t.is_typing),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn filters_deserialize_into_sorted_map() {
        let event = InboundEvent::from_sanitized(
            EventKind::DataSubscribe,
            json!({"entity": "tasks", "filters": {"z": "1", "a": "2"}}),
        )
        .unwrap();
        let InboundEvent::DataSubscribe(sub) = event else {
            panic!("expected dataSubscribe");
        };
        let keys: Vec<&String> = sub.filters.keys().collect();
        assert_eq!(keys, vec!["a", "z"]);
        assert_eq!(EventKind::DataSubscribe, InboundEvent::DataSubscribe(sub).kind());
    }
}
