//! WebSocket adapters for the realtime gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    handler (axum)                                    │
//! │   GET /ws?token=…  → authenticate → upgrade → socket pump            │
//! │   GET /realtime/stats                                                │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    ConnectionGateway                                 │
//! │   validate → rate limit → authorize → handler                        │
//! │   connections │ PresenceRegistry │ RoomManager                       │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ try_send
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │   ConnectionHandle → bounded mpsc → socket writer task               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - Wire envelope and outbound message types
//! - [`connection`] - Per-connection outbound queue
//! - [`presence`] - User → open connections
//! - [`rooms`] - Room membership in both directions
//! - [`gateway`] - Lifecycle, dispatch and fan-out
//! - [`handler`] - Axum upgrade handler and routes

pub mod connection;
pub mod gateway;
pub mod handler;
pub mod messages;
pub mod presence;
pub mod rooms;

pub use connection::{ConnectionHandle, Outbound};
pub use gateway::{ConnectionGateway, Delivery, GatewayConfig, GatewayError, GatewayStats};
pub use handler::{gateway_router, stats_handler, ws_handler, ConnectParams};
pub use messages::{ClientFrame, ServerMessage};
pub use presence::PresenceRegistry;
pub use rooms::RoomManager;
