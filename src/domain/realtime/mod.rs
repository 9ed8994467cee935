//! Real-time domain - room ids, authorization, inbound events and
//! notifications.
//!
//! Everything here is synchronous and free of I/O; the gateway adapter owns
//! the registries and calls into these types for every decision.

mod authorization;
mod events;
mod notification;
mod room;
mod validation;

pub use authorization::{AccessDecision, JoinOptions, RoomAuthorizer, AUDIT_TARGET};
pub use events::{
    DataSubscribe, EventKind, InboundEvent, MessageSend, NotificationRead, RoomJoin, RoomLeave,
    UserTyping,
};
pub use notification::{Notification, QueuedNotification};
pub use room::{PermissionClass, RoomId, RoomKind};
pub use validation::{sanitize_str, sanitize_value, EventValidationError, EventValidator};
