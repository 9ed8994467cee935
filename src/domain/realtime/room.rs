//! Typed room identifiers.
//!
//! Rooms travel over the wire as strings following
//!
//! ```text
//! room-id = kind ":" identifier *( ":" filter-key ":" filter-value )
//! ```
//!
//! and are parsed into a [`RoomId`] as soon as they enter the gateway. Filters
//! are held sorted by key so `data:tasks:b:1:a:2` and `data:tasks:a:2:b:1`
//! name the same room.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::domain::foundation::Role;

const SEPARATOR: char = ':';

/// Kind segment of a room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKind {
    Data,
    Notifications,
    Messages,
    Admin,
    Moderator,
    Chat,
    Other(String),
}

impl RoomKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "data" => RoomKind::Data,
            "notifications" => RoomKind::Notifications,
            "messages" => RoomKind::Messages,
            "admin" => RoomKind::Admin,
            "moderator" => RoomKind::Moderator,
            "chat" => RoomKind::Chat,
            other => RoomKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoomKind::Data => "data",
            RoomKind::Notifications => "notifications",
            RoomKind::Messages => "messages",
            RoomKind::Admin => "admin",
            RoomKind::Moderator => "moderator",
            RoomKind::Chat => "chat",
            RoomKind::Other(s) => s,
        }
    }

    /// Permission class for a well-formed room of this kind.
    pub fn permission_class(&self) -> PermissionClass {
        match self {
            RoomKind::Data | RoomKind::Chat | RoomKind::Other(_) => PermissionClass::Public,
            RoomKind::Notifications => PermissionClass::OwnerOnly,
            RoomKind::Messages => PermissionClass::Private,
            RoomKind::Admin | RoomKind::Moderator => PermissionClass::RoleBased,
        }
    }

    /// Minimum role for role-based kinds.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            RoomKind::Admin => Some(Role::Admin),
            RoomKind::Moderator => Some(Role::Moderator),
            _ => None,
        }
    }
}

/// Authorization category assigned to a room kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionClass {
    Public,
    OwnerOnly,
    Private,
    RoleBased,
}

impl fmt::Display for PermissionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PermissionClass::Public => "PUBLIC",
            PermissionClass::OwnerOnly => "OWNER_ONLY",
            PermissionClass::Private => "PRIVATE",
            PermissionClass::RoleBased => "ROLE_BASED",
        };
        write!(f, "{}", s)
    }
}

/// Parsed room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId {
    kind: RoomKind,
    identifier: String,
    filters: BTreeMap<String, String>,
    permission: PermissionClass,
    /// Fewer than two segments. Kept joinable as PUBLIC.
    malformed: bool,
    canonical: String,
}

impl RoomId {
    /// Parses a wire room identifier. Never fails: ids with fewer than two
    /// segments are flagged malformed and classed PUBLIC.
    ///
    /// A trailing filter key without a value is dropped.
    pub fn parse(raw: &str) -> Self {
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        if parts.len() < 2 {
            return Self {
                kind: RoomKind::Other(raw.to_string()),
                identifier: String::new(),
                filters: BTreeMap::new(),
                permission: PermissionClass::Public,
                malformed: true,
                canonical: raw.to_string(),
            };
        }

        let kind = RoomKind::parse(parts[0]);
        let filters = parts[2..]
            .chunks_exact(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();

        Self::build(kind, parts[1].to_string(), filters)
    }

    /// Room for an entity's change feed, optionally narrowed by filters.
    pub fn data(entity: impl Into<String>, filters: BTreeMap<String, String>) -> Self {
        Self::build(RoomKind::Data, entity.into(), filters)
    }

    /// Personal notification room of a user.
    pub fn notifications(user_id: impl Into<String>) -> Self {
        Self::build(RoomKind::Notifications, user_id.into(), BTreeMap::new())
    }

    /// Private message room owned by a user.
    pub fn messages(user_id: impl Into<String>) -> Self {
        Self::build(RoomKind::Messages, user_id.into(), BTreeMap::new())
    }

    /// Role-qualified room.
    pub fn with_kind(kind: RoomKind, identifier: impl Into<String>) -> Self {
        Self::build(kind, identifier.into(), BTreeMap::new())
    }

    /// Narrow a data room with extra filters; later keys win. Other kinds
    /// are returned unchanged.
    pub fn with_filters(self, extra: &BTreeMap<String, String>) -> Self {
        if self.kind != RoomKind::Data || self.malformed || extra.is_empty() {
            return self;
        }
        let mut filters = self.filters;
        filters.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::build(RoomKind::Data, self.identifier, filters)
    }

    fn build(kind: RoomKind, identifier: String, filters: BTreeMap<String, String>) -> Self {
        let mut canonical = format!("{}{}{}", kind.as_str(), SEPARATOR, identifier);
        for (key, value) in &filters {
            canonical.push(SEPARATOR);
            canonical.push_str(key);
            canonical.push(SEPARATOR);
            canonical.push_str(value);
        }
        Self {
            permission: kind.permission_class(),
            kind,
            identifier,
            filters,
            malformed: false,
            canonical,
        }
    }

    pub fn kind(&self) -> &RoomKind {
        &self.kind
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn permission_class(&self) -> PermissionClass {
        self.permission
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed
    }

    /// Canonical wire form, with filters in key order.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// True if this is the data room for `entity` and every filter matches a
    /// top-level field of `record` (compared by string form).
    pub fn matches_record(&self, entity: &str, record: &serde_json::Value) -> bool {
        if self.kind != RoomKind::Data || self.identifier != entity {
            return false;
        }
        self.filters.iter().all(|(key, expected)| {
            record
                .get(key)
                .and_then(scalar_to_string)
                .is_some_and(|actual| &actual == expected)
        })
    }
}

/// String form of a JSON scalar as it appears inside a room id.
pub(crate) fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}
