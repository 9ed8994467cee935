//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, roles, errors)
//! - `realtime` - Room ids, room authorization, inbound events, validation and notifications

pub mod foundation;
pub mod realtime;
