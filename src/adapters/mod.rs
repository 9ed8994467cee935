//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - JWT token verification and in-memory identity fixtures
//! - `notification_store` - Redis and in-memory list storage for the offline queue
//! - `rate_limiter` - In-memory fixed-window limiter
//! - `websocket` - Connection gateway, registries and the axum transport

pub mod auth;
pub mod notification_store;
pub mod rate_limiter;
pub mod websocket;
