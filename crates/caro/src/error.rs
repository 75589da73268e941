//! Unified error type for the caro server.

use caro_ledger::StoreError;
use caro_presence::PresenceError;
use caro_protocol::ProtocolError;
use caro_room::RoomError;
use caro_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CaroError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Handshake or authentication failed.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use caro_protocol::RoomCode;

    #[test]
    fn test_from_transport_error_wraps() {
        let err: CaroError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, CaroError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_presence_error_wraps() {
        let err: CaroError = PresenceError::AuthFailed("nope".into()).into();
        assert!(matches!(err, CaroError::Presence(_)));
    }

    #[test]
    fn test_from_room_error_keeps_message() {
        let err: CaroError = RoomError::NotFound(RoomCode::new("ABCDEF")).into();
        assert_eq!(err.to_string(), "room ABCDEF not found");
    }

    #[test]
    fn test_from_store_error_wraps() {
        let err: CaroError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, CaroError::Store(_)));
    }
}
