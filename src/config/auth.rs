//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{AuthenticatedUser, Role, UserId};

use super::error::ValidationError;
use super::server::Environment;

/// Minimum HS256 secret length accepted in production.
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Handshake token verification (HS256 shared secret)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared signing secret
    pub jwt_secret: SecretString,

    /// Expected `iss` claim, if any
    pub jwt_issuer: Option<String>,

    /// Clock skew tolerance for `exp`
    #[serde(default = "default_leeway")]
    pub jwt_leeway_secs: u64,

    /// Known users as comma-separated `id:role` pairs, loaded into the
    /// in-memory user directory
    pub users: Option<String>,
}

impl AuthConfig {
    /// Validate authentication configuration
    ///
    /// Production requires a secret of at least 32 bytes.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret_len = self.jwt_secret.expose_secret().len();
        if secret_len == 0 {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if *environment == Environment::Production && secret_len < MIN_PRODUCTION_SECRET_LEN {
            return Err(ValidationError::WeakJwtSecret(MIN_PRODUCTION_SECRET_LEN));
        }
        self.directory_users()?;
        Ok(())
    }

    /// Parse [`users`](Self::users) into directory records.
    ///
    /// A missing role defaults to `user`; the username is the id.
    pub fn directory_users(&self) -> Result<Vec<AuthenticatedUser>, ValidationError> {
        let Some(users) = self.users.as_deref() else {
            return Ok(Vec::new());
        };

        users
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (id, role) = entry.split_once(':').unwrap_or((entry, "user"));
                let user_id = UserId::new(id.trim())
                    .map_err(|_| ValidationError::InvalidUserEntry(entry.to_string()))?;
                Ok(AuthenticatedUser::new(
                    user_id,
                    id.trim(),
                    Role::from_name(role.trim()),
                ))
            })
            .collect()
    }
}

fn default_leeway() -> u64 {
    30
}
