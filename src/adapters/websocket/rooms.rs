//! Room membership registry.
//!
//! Rooms are keyed by canonical [`RoomId`], and membership is tracked in both
//! directions so a disconnect can be cleaned up without scanning every room.
//!
//! # Architecture
//!
//! ```text
//! Room: data:tasks           Room: notifications:alice
//! ├── conn-a                 └── conn-a
//! ├── conn-b
//! └── conn-c                 Connection: conn-a
//!                            ├── data:tasks
//!                            └── notifications:alice
//! ```
//!
//! A connection has an entry (possibly empty) iff it is registered; rooms
//! with no members are removed.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::domain::foundation::ConnectionId;
use crate::domain::realtime::{RoomId, RoomKind};

#[derive(Debug, Default)]
struct RoomState {
    /// Map of room → member connections.
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
    /// Map of connection → joined rooms for O(1) cleanup on disconnect.
    memberships: HashMap<ConnectionId, HashSet<RoomId>>,
}

/// Manages room membership for every open connection.
///
/// # Thread Safety
///
/// Both directions live behind one `RwLock` so they never disagree.
/// Broadcast lookups (reads) vastly outnumber joins/leaves (writes).
#[derive(Debug, Default)]
pub struct RoomManager {
    state: RwLock<RoomState>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with no rooms.
    pub async fn register(&self, connection_id: ConnectionId) {
        self.state
            .write()
            .await
            .memberships
            .entry(connection_id)
            .or_default();
    }

    /// Add a registered connection to a room.
    ///
    /// Returns false if the connection is not registered or already a member.
    pub async fn join(&self, connection_id: ConnectionId, room: &RoomId) -> bool {
        let mut state = self.state.write().await;
        let Some(joined) = state.memberships.get_mut(&connection_id) else {
            return false;
        };
        if !joined.insert(room.clone()) {
            return false;
        }
        state
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection_id);
        true
    }

    /// Remove a connection from a room. Returns true if it was a member.
    pub async fn leave(&self, connection_id: ConnectionId, room: &RoomId) -> bool {
        let mut state = self.state.write().await;
        let was_member = state
            .memberships
            .get_mut(&connection_id)
            .is_some_and(|joined| joined.remove(room));
        if was_member {
            remove_member(&mut state.rooms, room, connection_id);
        }
        was_member
    }

    /// Drop a connection and all of its memberships.
    ///
    /// Returns the rooms it was in.
    pub async fn remove_connection(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        let mut state = self.state.write().await;
        let Some(joined) = state.memberships.remove(&connection_id) else {
            return Vec::new();
        };
        for room in &joined {
            remove_member(&mut state.rooms, room, connection_id);
        }
        joined.into_iter().collect()
    }

    pub async fn is_member(&self, connection_id: ConnectionId, room: &RoomId) -> bool {
        self.state
            .read()
            .await
            .rooms
            .get(room)
            .is_some_and(|members| members.contains(&connection_id))
    }

    /// Snapshot of a room's members.
    pub async fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.state
            .read()
            .await
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the rooms a connection has joined.
    pub async fn rooms_of(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        self.state
            .read()
            .await
            .memberships
            .get(&connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Connections subscribed to any data room of `entity` whose filters
    /// match `record`. Each connection appears once.
    pub async fn data_subscribers(
        &self,
        entity: &str,
        record: &serde_json::Value,
    ) -> HashSet<ConnectionId> {
        let state = self.state.read().await;
        state
            .rooms
            .iter()
            .filter(|(room, _)| {
                room.kind() == &RoomKind::Data && room.matches_record(entity, record)
            })
            .flat_map(|(_, members)| members.iter().copied())
            .collect()
    }

    /// Number of rooms with at least one member.
    pub async fn active_room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.rooms.clear();
        state.memberships.clear();
    }
}

fn remove_member(
    rooms: &mut HashMap<RoomId, HashSet<ConnectionId>>,
    room: &RoomId,
    connection_id: ConnectionId,
) {
    if let Some(members) = rooms.get_mut(room) {
        members.remove(&connection_id);
        if members.is_empty() {
            rooms.remove(room);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn join_requires_registration() {
        let rooms = RoomManager::new();
        let conn = ConnectionId::new();
        let room = RoomId::parse("chat:lobby");

        assert!(!rooms.join(conn, &room).await);
        rooms.register(conn).await;
        assert!(rooms.join(conn, &room).await);
        assert!(!rooms.join(conn, &room).await);
        assert!(rooms.is_member(conn, &room).await);
    }

    #[tokio::test]
    async fn leave_removes_empty_rooms() {
        let rooms = RoomManager::new();
        let conn = ConnectionId::new();
        let room = RoomId::parse("chat:lobby");
        rooms.register(conn).await;
        rooms.join(conn, &room).await;

        assert!(rooms.leave(conn, &room).await);
        assert!(!rooms.leave(conn, &room).await);
        assert_eq!(rooms.active_room_count().await, 0);
        assert!(rooms.join(conn, &room).await, "still registered after leaving");
    }

    #[tokio::test]
    async fn remove_connection_cleans_both_directions() {
        let rooms = RoomManager::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let lobby = RoomId::parse("chat:lobby");
        let tasks = RoomId::parse("data:tasks");
        rooms.register(a).await;
        rooms.register(b).await;
        rooms.join(a, &lobby).await;
        rooms.join(a, &tasks).await;
        rooms.join(b, &lobby).await;

        let left = rooms.remove_connection(a).await;
        assert_eq!(left.len(), 2);
        assert!(!rooms.join(a, &lobby).await, "no longer registered");
        assert_eq!(rooms.members(&lobby).await, vec![b]);
        assert!(rooms.members(&tasks).await.is_empty());
        assert_eq!(rooms.active_room_count().await, 1);
    }

    #[tokio::test]
    async fn data_subscribers_match_filters_once_per_connection() {
        let rooms = RoomManager::new();
        let all = ConnectionId::new();
        let open_only = ConnectionId::new();
        let done_only = ConnectionId::new();
        for conn in [all, open_only, done_only] {
            rooms.register(conn).await;
        }
        rooms.join(all, &RoomId::parse("data:tasks")).await;
        rooms.join(all, &RoomId::parse("data:tasks:status:open")).await;
        rooms.join(open_only, &RoomId::parse("data:tasks:status:open")).await;
        rooms.join(done_only, &RoomId::parse("data:tasks:status:done")).await;

        let hits = rooms
            .data_subscribers("tasks", &json!({"status": "open"}))
            .await;
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&all));
        assert!(hits.contains(&open_only));

        let other = rooms.data_subscribers("notes", &json!({})).await;
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let rooms = RoomManager::new();
        let conn = ConnectionId::new();
        rooms.register(conn).await;
        rooms.join(conn, &RoomId::parse("chat:lobby")).await;
        rooms.clear().await;
        assert_eq!(rooms.active_room_count().await, 0);
        assert!(!rooms.join(conn, &RoomId::parse("chat:lobby")).await);
    }
}
