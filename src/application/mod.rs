//! Application layer - services that coordinate ports.
//!
//! - `NotificationQueue` - best-effort offline queue over a `NotificationStore`

mod notification_queue;

pub use notification_queue::{
    NotificationQueue, NotificationQueueConfig, DEFAULT_NOTIFICATION_TTL, DEFAULT_STORE_TIMEOUT,
};
