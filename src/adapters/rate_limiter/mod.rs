//! Rate limiter adapters.
//!
//! - `InMemoryRateLimiter` - per-process fixed-window counters keyed by connection

mod config;
mod in_memory;

pub use config::RateLimitConfig;
pub use in_memory::InMemoryRateLimiter;
