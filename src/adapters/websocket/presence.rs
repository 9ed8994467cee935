//! Presence registry: which connections each user has open.

use std::collections::{HashMap, HashSet};

use crate::domain::foundation::{ConnectionId, UserId};

/// Maps users to their open connections.
///
/// A user has an entry iff at least one connection is open; empty sets are
/// removed eagerly.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: HashMap<UserId, HashSet<ConnectionId>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection. Returns true if the user just came online.
    pub fn add(&mut self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let connections = self.users.entry(user_id.clone()).or_default();
        let was_offline = connections.is_empty();
        connections.insert(connection_id);
        was_offline
    }

    /// Forget a connection. Returns true if the user just went offline.
    pub fn remove(&mut self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let Some(connections) = self.users.get_mut(user_id) else {
            return false;
        };
        if !connections.remove(&connection_id) {
            return false;
        }
        if connections.is_empty() {
            self.users.remove(user_id);
            return true;
        }
        false
    }

    /// Snapshot of a user's open connections.
    pub fn connections_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.users
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn online_users(&self) -> usize {
        self.users.len()
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    #[test]
    fn first_connection_brings_user_online() {
        let mut presence = PresenceRegistry::new();
        assert!(presence.add(&alice(), ConnectionId::new()));
        assert!(!presence.add(&alice(), ConnectionId::new()));
        assert!(presence.is_online(&alice()));
        assert_eq!(presence.connections_of(&alice()).len(), 2);
    }

    #[test]
    fn last_disconnect_takes_user_offline() {
        let mut presence = PresenceRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        presence.add(&alice(), a);
        presence.add(&alice(), b);

        assert!(!presence.remove(&alice(), a));
        assert!(presence.remove(&alice(), b));
        assert!(!presence.is_online(&alice()));
        assert_eq!(presence.online_users(), 0);
    }

    #[test]
    fn removing_unknown_connection_is_a_no_op() {
        let mut presence = PresenceRegistry::new();
        presence.add(&alice(), ConnectionId::new());
        assert!(!presence.remove(&alice(), ConnectionId::new()));
        assert!(!presence.remove(&UserId::new("bob").unwrap(), ConnectionId::new()));
        assert!(presence.is_online(&alice()));
    }
}
