//! Realtime Gateway - authenticated WebSocket fan-out for user-owned data
//!
//! Clients connect with a bearer token, subscribe to rooms and receive
//! entity updates, notifications, presence changes and chat traffic. Users
//! who are offline get their notifications from a Redis-backed queue on
//! their next connection.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
