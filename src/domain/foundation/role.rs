//! Role hierarchy used for room authorization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user's role, ordered by privilege rank.
///
/// Unrecognized role names are kept as `Unrecognized` and rank like a guest,
/// so a typo in a stored role can never grant access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Moderator,
    User,
    Guest,
    Unrecognized(String),
}

impl Role {
    /// Numeric privilege rank: admin=100, moderator=50, user=10, guest=0.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Admin => 100,
            Role::Moderator => 50,
            Role::User => 10,
            Role::Guest | Role::Unrecognized(_) => 0,
        }
    }

    /// Returns true if this role's rank is at least `required`'s rank.
    pub fn at_least(&self, required: &Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Parse a role name, case-insensitively. Never fails.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            "user" => Role::User,
            "guest" => Role::Guest,
            _ => Role::Unrecognized(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::User => "user",
            Role::Guest => "guest",
            Role::Unrecognized(name) => name,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::from_name(s))
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from_name(&s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
