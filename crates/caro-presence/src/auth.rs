//! Authentication hook for the handshake.
//!
//! Accounts live outside the caro server. The server only needs to know
//! which identity a handshake token belongs to, so it asks an
//! [`Authenticator`]: production plugs in whatever validates the account
//! system's tokens, development and tests use
//! [`NumericTokenAuthenticator`].

use std::future::Future;

use caro_protocol::PlayerId;

use crate::PresenceError;

/// Validates a client's token and returns its identity.
///
/// # Example
///
/// ```rust
/// use caro_presence::{Authenticator, PresenceError};
/// use caro_protocol::PlayerId;
///
/// /// Everyone is player 1.
/// struct SoloAuthenticator;
///
/// impl Authenticator for SoloAuthenticator {
///     async fn authenticate(&self, _token: &str) -> Result<PlayerId, PresenceError> {
///         Ok(PlayerId(1))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Called once per connection, with the token from the client's
    /// `Handshake`.
    ///
    /// # Errors
    /// [`PresenceError::AuthFailed`] if the token is invalid or expired.
    fn authenticate(&self, token: &str) -> impl Future<Output = Result<PlayerId, PresenceError>> + Send;
}

/// Accepts a decimal player id as the token. Development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericTokenAuthenticator;

impl Authenticator for NumericTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, PresenceError> {
        let id: u64 = token
            .trim()
            .parse()
            .map_err(|_| PresenceError::AuthFailed("token must be a player id".into()))?;
        if id == 0 {
            return Err(PresenceError::AuthFailed("player id 0 is reserved".into()));
        }
        Ok(PlayerId(id))
    }
}
