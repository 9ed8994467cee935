//! Room authorization engine.
//!
//! Pure decision logic: given a user, a parsed [`RoomId`] and join options,
//! decide whether the user may join (subscribe to) or broadcast into the room.
//! No I/O happens here; the gateway calls [`RoomAuthorizer::audit_access`]
//! after each decision so the outcome lands in the audit log.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::domain::foundation::{AuthenticatedUser, Role, UserId};

use super::room::{PermissionClass, RoomId, RoomKind};

/// Tracing target for authorization audit records.
pub const AUDIT_TARGET: &str = "audit";

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub authorized: bool,
    pub reason: String,
}

impl AccessDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            authorized: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            reason: reason.into(),
        }
    }
}

/// Extra context for PRIVATE rooms.
#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    pub invited_users: HashSet<UserId>,
}

impl JoinOptions {
    pub fn with_invited(mut self, user_id: UserId) -> Self {
        self.invited_users.insert(user_id);
        self
    }
}

/// Stateless authorization engine over the room grammar and role hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomAuthorizer;

impl RoomAuthorizer {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether `user` may join `room`.
    ///
    /// A missing user is always denied.
    pub fn can_join(
        &self,
        user: Option<&AuthenticatedUser>,
        room: &RoomId,
        options: &JoinOptions,
    ) -> AccessDecision {
        let Some(user) = user else {
            return AccessDecision::deny("Invalid user");
        };

        match room.permission_class() {
            PermissionClass::Public => AccessDecision::allow("Public room"),
            PermissionClass::OwnerOnly => {
                if room.identifier() == user.id.as_str() {
                    AccessDecision::allow("Owner access")
                } else {
                    AccessDecision::deny("Room is owner only")
                }
            }
            PermissionClass::Private => {
                if room.identifier() == user.id.as_str() {
                    AccessDecision::allow("Owner access")
                } else if options.invited_users.contains(&user.id) {
                    AccessDecision::allow("Invited user")
                } else {
                    AccessDecision::deny("Private room: not owner or invited")
                }
            }
            PermissionClass::RoleBased => {
                let required = room.kind().required_role().unwrap_or(Role::Admin);
                if user.role.at_least(&required) {
                    AccessDecision::allow(format!("Role '{}' satisfies '{}'", user.role, required))
                } else {
                    AccessDecision::deny(format!("Requires role '{}' or higher", required))
                }
            }
        }
    }

    /// Decide whether `user` may push events into `room`.
    ///
    /// Requires [`can_join`](Self::can_join); data rooms additionally require
    /// admin rank, since only privileged actors publish entity changes.
    pub fn can_broadcast(
        &self,
        user: Option<&AuthenticatedUser>,
        room: &RoomId,
        options: &JoinOptions,
    ) -> AccessDecision {
        let join = self.can_join(user, room, options);
        if !join.authorized {
            return join;
        }

        if room.kind() == &RoomKind::Data {
            let is_admin = user.is_some_and(|u| u.role.at_least(&Role::Admin));
            if !is_admin {
                return AccessDecision::deny("Only admins may broadcast to data rooms");
            }
        }

        join
    }

    /// Rooms a user is entitled to for a subscription to `entity`.
    ///
    /// Order is deterministic: own notification room, own message room, the
    /// (filtered) entity room, then role-qualified rooms for the entity.
    pub fn list_authorized_rooms(
        &self,
        user: &AuthenticatedUser,
        entity: &str,
        filters: &BTreeMap<String, String>,
    ) -> Vec<RoomId> {
        let mut rooms = vec![
            RoomId::notifications(user.id.as_str()),
            RoomId::messages(user.id.as_str()),
            RoomId::data(entity, filters.clone()),
        ];

        if user.role.at_least(&Role::Admin) {
            rooms.push(RoomId::with_kind(RoomKind::Admin, entity));
        }
        if user.role.at_least(&Role::Moderator) {
            rooms.push(RoomId::with_kind(RoomKind::Moderator, entity));
        }

        rooms
    }

    /// Emit one structured audit record for an authorization decision.
    pub fn audit_access(
        &self,
        user: Option<&AuthenticatedUser>,
        room: &RoomId,
        decision: &AccessDecision,
    ) {
        let user_id = user.map(|u| u.id.as_str()).unwrap_or("<none>");
        let role = user.map(|u| u.role.as_str()).unwrap_or("<none>");

        if decision.authorized {
            tracing::info!(
                target: AUDIT_TARGET,
                user_id,
                role,
                room_id = %room,
                permission = %room.permission_class(),
                authorized = true,
                reason = %decision.reason,
                "room access granted"
            );
        } else {
            tracing::warn!(
                target: AUDIT_TARGET,
                user_id,
                role,
                room_id = %room,
                permission = %room.permission_class(),
                authorized = false,
                reason = %decision.reason,
                "room access denied"
            );
        }

        if room.is_malformed() {
            tracing::warn!(
                target: AUDIT_TARGET,
                room_id = %room,
                "malformed room id treated as public"
            );
        }
    }
}
