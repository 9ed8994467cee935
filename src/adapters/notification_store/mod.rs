//! Notification store adapters.
//!
//! - `RedisNotificationStore` - Redis lists, shared across gateway processes
//! - `InMemoryNotificationStore` - process-local lists with failure injection

mod in_memory;
mod redis;

pub use self::redis::RedisNotificationStore;
pub use in_memory::InMemoryNotificationStore;
