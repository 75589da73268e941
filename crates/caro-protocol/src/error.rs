//! Error types for the protocol layer.

/// Errors raised while turning frames into values or back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Well-formed but violates protocol rules (wrong first frame,
    /// version mismatch).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
