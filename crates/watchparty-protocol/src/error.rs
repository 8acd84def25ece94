//! Error types for the protocol layer.
//!
//! Each crate in the relay defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in serialization or in a
//! malformed identifier, not in the store or in room management.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown `event` tag, or missing
    /// required fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room identifier had the wrong length or contained characters
    /// outside the URL-safe alphabet.
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),
}
