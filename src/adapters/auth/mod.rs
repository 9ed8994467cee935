//! Authentication adapters.
//!
//! Implementations of the `AccessTokenVerifier` and `UserDirectory` ports:
//!
//! - `jwt` - HS256 shared-secret token verification
//! - `mock` - Test implementations and an in-memory user directory

mod jwt;
mod mock;

pub use jwt::{GatewayClaims, JwtAccessTokenVerifier, JwtConfig};
pub use mock::{InMemoryUserDirectory, MockAccessTokenVerifier};
