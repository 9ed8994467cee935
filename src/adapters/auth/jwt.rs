//! HS256 JWT adapter for access token verification.
//!
//! Implements the `AccessTokenVerifier` port with a shared secret. It
//! validates tokens by:
//!
//! 1. Checking the HS256 signature against the configured secret
//! 2. Checking expiry and, when configured, the issuer
//! 3. Mapping `sub` and `role` claims to domain `AccessClaims`
//!
//! # Example
//!
//! ```ignore
//! let verifier = JwtAccessTokenVerifier::new(JwtConfig::new(secret));
//! let claims = verifier.verify_access_token("eyJ...").await?;
//! ```

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AccessClaims, AuthError, Role, UserId};
use crate::ports::AccessTokenVerifier;

/// Configuration for the JWT adapter.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret.
    pub secret: SecretString,

    /// Expected `iss` claim. Not checked when `None`.
    pub issuer: Option<String>,

    /// Clock skew tolerance in seconds for `exp`.
    pub leeway_secs: u64,
}

impl JwtConfig {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            issuer: None,
            leeway_secs: 0,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

/// JWT claims carried by gateway access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayClaims {
    /// Subject - the user ID
    pub sub: String,

    /// Role name; absent means a plain user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Expiry timestamp (Unix epoch seconds)
    pub exp: i64,

    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Verifies HS256 access tokens.
pub struct JwtAccessTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAccessTokenVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key,
            validation,
        }
    }
}

#[async_trait]
impl AccessTokenVerifier for JwtAccessTokenVerifier {
    async fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = decode::<GatewayClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidIssuer => {
                    tracing::warn!("Invalid issuer in token");
                    AuthError::InvalidToken
                }
                other => {
                    tracing::debug!("Token rejected: {:?}", other);
                    AuthError::InvalidToken
                }
            },
        )?;

        let user_id = UserId::new(data.claims.sub).map_err(|_| {
            tracing::warn!("Token has an empty subject");
            AuthError::InvalidToken
        })?;
        let role = data
            .claims
            .role
            .as_deref()
            .map(Role::from_name)
            .unwrap_or_default();

        Ok(AccessClaims { user_id, role })
    }
}
