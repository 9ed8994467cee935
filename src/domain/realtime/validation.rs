//! Event Validator - schema checks and sanitization for inbound events.
//!
//! ```text
//!   raw payload ──► check constraints (all of them) ──► strip unknown fields
//!                          │                                   │
//!                          ▼                                   ▼
//!                 EventValidationError::Multiple       escape + trim strings
//!                                                              │
//!                                                              ▼
//!                                                        InboundEvent
//! ```
//!
//! Constraints run against the raw payload so that escaping can never push a
//! value over a length limit or smuggle a character past a pattern.

use serde_json::{Map, Value};
use thiserror::Error;

use super::events::{EventKind, InboundEvent};
use super::room::scalar_to_string;

const ENTITY_MAX: usize = 100;
const FILTERS_MAX_KEYS: usize = 10;
const FILTER_KEY_MAX: usize = 50;
const FILTER_VALUE_MAX: usize = 100;
const NOTIFICATION_ID_LEN: usize = 24;
const ROOM_ID_MAX: usize = 200;
const MESSAGE_MAX: usize = 5000;

/// Errors produced while validating an inbound event.
///
/// Messages may echo field names but never payload values, so they are safe
/// to send back to the client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventValidationError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Payload must be a JSON object")]
    NotAnObject,

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid type for field {field}: expected {expected}")]
    InvalidType { field: String, expected: &'static str },

    #[error("Field {field} must be {min} to {max} characters")]
    InvalidLength { field: String, min: usize, max: usize },

    #[error("Invalid format for field {field}: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("Field {field} allows at most {max} entries")]
    TooManyEntries { field: String, max: usize },

    #[error("Validation errors: {0:?}")]
    Multiple(Vec<EventValidationError>),
}

impl EventValidationError {
    fn missing(field: &str) -> Self {
        Self::MissingRequired {
            field: field.to_string(),
        }
    }

    fn invalid_type(field: &str, expected: &'static str) -> Self {
        Self::InvalidType {
            field: field.to_string(),
            expected,
        }
    }

    fn length(field: &str, min: usize, max: usize) -> Self {
        Self::InvalidLength {
            field: field.to_string(),
            min,
            max,
        }
    }

    fn format(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Client-facing message. Aggregated errors are joined so the client sees
    /// every violated constraint at once.
    pub fn to_client_message(&self) -> String {
        match self {
            EventValidationError::Multiple(errors) => errors
                .iter()
                .map(|e| e.to_client_message())
                .collect::<Vec<_>>()
                .join("; "),
            EventValidationError::UnknownEvent(name) => {
                format!("Unknown event: {}", sanitize_str(name))
            }
            other => other.to_string(),
        }
    }

    /// Get the count of validation errors.
    pub fn error_count(&self) -> usize {
        match self {
            EventValidationError::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }

    fn collect(mut errors: Vec<EventValidationError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            EventValidationError::Multiple(errors)
        }
    }
}

/// Stateless validator for every inbound event kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventValidator;

impl EventValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `payload` for the event called `event_name`.
    ///
    /// Returns the sanitized, typed event or every violated constraint.
    pub fn validate(
        &self,
        event_name: &str,
        payload: &Value,
    ) -> Result<InboundEvent, EventValidationError> {
        let kind: EventKind = event_name.parse()?;
        let obj = payload.as_object().ok_or(EventValidationError::NotAnObject)?;

        let mut errors = Vec::new();
        match kind {
            EventKind::DataSubscribe => {
                check_entity(obj, true, &mut errors);
                check_filters(obj, &mut errors);
            }
            EventKind::NotificationRead => check_notification_id(obj, &mut errors),
            EventKind::RoomJoin => {
                check_room_pattern(obj, &mut errors);
                check_entity(obj, false, &mut errors);
                check_filters(obj, &mut errors);
            }
            EventKind::RoomLeave => check_room_pattern(obj, &mut errors),
            EventKind::UserTyping => {
                check_typing_room(obj, &mut errors);
                check_optional_bool(obj, "isTyping", &mut errors);
            }
            EventKind::MessageSend => {
                check_typing_room(obj, &mut errors);
                check_message(obj, &mut errors);
                check_metadata(obj, &mut errors);
            }
        }

        if !errors.is_empty() {
            return Err(EventValidationError::collect(errors));
        }

        let sanitized = sanitize_payload(kind, obj);
        InboundEvent::from_sanitized(kind, sanitized)
            .map_err(|e| EventValidationError::format("payload", e.to_string()))
    }
}

// =============================================================================
// Constraint checks
// =============================================================================

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
    errors: &mut Vec<EventValidationError>,
) -> Option<&'a str> {
    match obj.get(field) {
        None | Some(Value::Null) => {
            errors.push(EventValidationError::missing(field));
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            errors.push(EventValidationError::invalid_type(field, "string"));
            None
        }
    }
}

fn check_entity(obj: &Map<String, Value>, required: bool, errors: &mut Vec<EventValidationError>) {
    if !required && matches!(obj.get("entity"), None | Some(Value::Null)) {
        return;
    }
    let Some(entity) = required_str(obj, "entity", errors) else {
        return;
    };
    let len = entity.chars().count();
    if len == 0 || len > ENTITY_MAX {
        errors.push(EventValidationError::length("entity", 1, ENTITY_MAX));
    }
    if !entity.chars().all(is_identifier_char) {
        errors.push(EventValidationError::format(
            "entity",
            "only letters, digits, '_' and '-' are allowed",
        ));
    }
}

fn check_filters(obj: &Map<String, Value>, errors: &mut Vec<EventValidationError>) {
    let filters = match obj.get("filters") {
        None | Some(Value::Null) => return,
        Some(Value::Object(map)) => map,
        Some(_) => {
            errors.push(EventValidationError::invalid_type("filters", "object"));
            return;
        }
    };

    if filters.len() > FILTERS_MAX_KEYS {
        errors.push(EventValidationError::TooManyEntries {
            field: "filters".to_string(),
            max: FILTERS_MAX_KEYS,
        });
    }

    for (key, value) in filters {
        let key_len = key.chars().count();
        if key_len == 0 || key_len > FILTER_KEY_MAX || !key.chars().all(is_identifier_char) {
            errors.push(EventValidationError::format(
                "filters",
                format!(
                    "keys must be 1 to {} letters, digits, '_' or '-'",
                    FILTER_KEY_MAX
                ),
            ));
            continue;
        }
        let field = format!("filters.{}", key);
        match value {
            Value::String(s) => {
                let len = s.chars().count();
                if len == 0 || len > FILTER_VALUE_MAX {
                    errors.push(EventValidationError::length(&field, 1, FILTER_VALUE_MAX));
                }
                if s.contains(':') {
                    errors.push(EventValidationError::format(&field, "':' is not allowed"));
                }
            }
            Value::Number(_) | Value::Bool(_) => {}
            _ => errors.push(EventValidationError::invalid_type(
                &field,
                "string, number or boolean",
            )),
        }
    }
}

fn check_notification_id(obj: &Map<String, Value>, errors: &mut Vec<EventValidationError>) {
    let Some(id) = required_str(obj, "notificationId", errors) else {
        return;
    };
    if id.len() != NOTIFICATION_ID_LEN || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        errors.push(EventValidationError::format(
            "notificationId",
            format!("expected {} hexadecimal characters", NOTIFICATION_ID_LEN),
        ));
    }
}

fn check_room_pattern(obj: &Map<String, Value>, errors: &mut Vec<EventValidationError>) {
    let Some(room) = required_str(obj, "roomId", errors) else {
        return;
    };
    let len = room.chars().count();
    if len == 0 || len > ROOM_ID_MAX {
        errors.push(EventValidationError::length("roomId", 1, ROOM_ID_MAX));
    }
    if !room.chars().all(|c| is_identifier_char(c) || c == ':') {
        errors.push(EventValidationError::format(
            "roomId",
            "only letters, digits, ':', '_' and '-' are allowed",
        ));
    }
}

fn check_typing_room(obj: &Map<String, Value>, errors: &mut Vec<EventValidationError>) {
    let Some(room) = required_str(obj, "roomId", errors) else {
        return;
    };
    let len = room.chars().count();
    if len == 0 || len > ROOM_ID_MAX {
        errors.push(EventValidationError::length("roomId", 1, ROOM_ID_MAX));
    }
}

fn check_optional_bool(obj: &Map<String, Value>, field: &str, errors: &mut Vec<EventValidationError>) {
    match obj.get(field) {
        None | Some(Value::Null) | Some(Value::Bool(_)) => {}
        Some(_) => errors.push(EventValidationError::invalid_type(field, "boolean")),
    }
}

fn check_message(obj: &Map<String, Value>, errors: &mut Vec<EventValidationError>) {
    let Some(message) = required_str(obj, "message", errors) else {
        return;
    };
    let len = message.chars().count();
    if len == 0 || len > MESSAGE_MAX {
        errors.push(EventValidationError::length("message", 1, MESSAGE_MAX));
    } else if message.trim().is_empty() {
        errors.push(EventValidationError::format("message", "must not be blank"));
    }
}

fn check_metadata(obj: &Map<String, Value>, errors: &mut Vec<EventValidationError>) {
    match obj.get("metadata") {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(_) => errors.push(EventValidationError::invalid_type("metadata", "object")),
    }
}

// =============================================================================
// Sanitization
// =============================================================================

/// HTML-escape a string and trim surrounding whitespace.
pub fn sanitize_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            other => out.push(other),
        }
    }
    out
}

/// Recursively sanitize every string inside a JSON value.
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn sanitize_payload(kind: EventKind, obj: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    for field in kind.known_fields() {
        let Some(value) = obj.get(*field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let cleaned = if *field == "filters" {
            stringify_filters(value)
        } else {
            sanitize_value(value)
        };
        out.insert(field.to_string(), cleaned);
    }
    Value::Object(out)
}

/// Filters become string-valued so they can be embedded in a room id.
fn stringify_filters(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return Value::Object(Map::new());
    };
    Value::Object(
        map.iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), Value::String(sanitize_str(&s)))))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::realtime::events::{DataSubscribe, MessageSend};
    use serde_json::json;

    fn validator() -> EventValidator {
        EventValidator::new()
    }

    #[test]
    fn data_subscribe_rejects_markup_entity() {
        let err = validator()
            .validate("dataSubscribe", &json!({"entity": "<script>"}))
            .unwrap_err();
        assert!(matches!(err, EventValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn data_subscribe_accepts_plain_entity_unchanged() {
        let event = validator()
            .validate("dataSubscribe", &json!({"entity": "users"}))
            .unwrap();
        assert_eq!(
            event,
            InboundEvent::DataSubscribe(DataSubscribe {
                entity: "users".to_string(),
                filters: Default::default(),
            })
        );
    }

    #[test]
    fn notification_read_requires_24_hex_chars() {
        assert!(validator()
            .validate("notificationRead", &json!({"notificationId": "not-an-id"}))
            .is_err());
        assert!(validator()
            .validate(
                "notificationRead",
                &json!({"notificationId": "507f1f77bcf86cd799439011"})
            )
            .is_ok());
    }

    #[test]
    fn unknown_event_fails() {
        let err = validator().validate("dropTables", &json!({})).unwrap_err();
        assert_eq!(err, EventValidationError::UnknownEvent("dropTables".to_string()));
    }

    #[test]
    fn unknown_event_message_is_escaped() {
        let err = validator().validate("<img>", &json!({})).unwrap_err();
        assert_eq!(err.to_client_message(), "Unknown event: &lt;img&gt;");
    }

    #[test]
    fn non_object_payload_fails() {
        let err = validator().validate("roomLeave", &json!("chat:x")).unwrap_err();
        assert_eq!(err, EventValidationError::NotAnObject);
    }

    #[test]
    fn all_violations_are_aggregated() {
        let err = validator()
            .validate("messageSend", &json!({"metadata": 5}))
            .unwrap_err();
        assert_eq!(err.error_count(), 3);
        let message = err.to_client_message();
        assert!(message.contains("roomId"));
        assert!(message.contains("message"));
        assert!(message.contains("metadata"));
    }

    #[test]
    fn room_join_pattern_and_length() {
        assert!(validator()
            .validate("roomJoin", &json!({"roomId": "chat:lobby"}))
            .is_ok());
        assert!(validator()
            .validate("roomJoin", &json!({"roomId": "chat lobby"}))
            .is_err());
        let long = "a".repeat(201);
        assert!(validator().validate("roomLeave", &json!({"roomId": long})).is_err());
        let max = "a".repeat(200);
        assert!(validator().validate("roomLeave", &json!({"roomId": max})).is_ok());
    }

    #[test]
    fn typing_room_only_needs_length() {
        assert!(validator()
            .validate("userTyping", &json!({"roomId": "chat:café", "isTyping": false}))
            .is_ok());
        assert!(validator().validate("userTyping", &json!({"roomId": ""})).is_err());
        assert!(validator()
            .validate("userTyping", &json!({"roomId": "chat:x", "isTyping": "yes"}))
            .is_err());
    }

    #[test]
    fn message_length_bounds() {
        let ok = "m".repeat(5000);
        assert!(validator()
            .validate("messageSend", &json!({"roomId": "chat:x", "message": ok}))
            .is_ok());
        let too_long = "m".repeat(5001);
        assert!(validator()
            .validate("messageSend", &json!({"roomId": "chat:x", "message": too_long}))
            .is_err());
        assert!(validator()
            .validate("messageSend", &json!({"roomId": "chat:x", "message": ""}))
            .is_err());
        assert!(validator()
            .validate("messageSend", &json!({"roomId": "chat:x", "message": "   "}))
            .is_err());
    }

    #[test]
    fn message_is_escaped_trimmed_and_unknown_fields_stripped() {
        let event = validator()
            .validate(
                "messageSend",
                &json!({
                    "roomId": "chat:x",
                    "message": "  <b>hi</b> & 'bye'  ",
                    "metadata": {"note": " a/b "},
                    "isAdmin": true
                }),
            )
            .unwrap();
        assert_eq!(
            event,
            InboundEvent::MessageSend(MessageSend {
                room_id: "chat:x".to_string(),
                message: "&lt;b&gt;hi&lt;&#x2F;b&gt; &amp; &#x27;bye&#x27;".to_string(),
                metadata: Some(json!({"note": "a&#x2F;b"})),
            })
        );
    }

    #[test]
    fn filters_are_bounded_and_stringified() {
        let event = validator()
            .validate(
                "dataSubscribe",
                &json!({"entity": "tasks", "filters": {"priority": 3, "done": false, "owner": "u1"}}),
            )
            .unwrap();
        let InboundEvent::DataSubscribe(sub) = event else {
            panic!("expected dataSubscribe");
        };
        assert_eq!(sub.filters.get("priority").map(String::as_str), Some("3"));
        assert_eq!(sub.filters.get("done").map(String::as_str), Some("false"));

        let many: Map<String, Value> = (0..11).map(|i| (format!("k{}", i), json!("v"))).collect();
        assert!(validator()
            .validate("dataSubscribe", &json!({"entity": "tasks", "filters": many}))
            .is_err());
        assert!(validator()
            .validate("dataSubscribe", &json!({"entity": "tasks", "filters": {"a": "x:y"}}))
            .is_err());
        assert!(validator()
            .validate("dataSubscribe", &json!({"entity": "tasks", "filters": {"a": [1]}}))
            .is_err());
    }

    #[test]
    fn sanitize_escapes_every_special_character() {
        assert_eq!(
            sanitize_str(" &<>\"'/\\` "),
            "&amp;&lt;&gt;&quot;&#x27;&#x2F;&#x5C;&#96;"
        );
    }
}
