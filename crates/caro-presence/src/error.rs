//! Error types for the presence layer.

/// Errors raised while establishing who is on a connection.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The token was rejected by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The handshake carried no token.
    #[error("handshake carried no token")]
    MissingToken,

    /// No handshake arrived within the configured timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,
}
