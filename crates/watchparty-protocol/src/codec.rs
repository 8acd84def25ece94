//! Codec trait and implementations for serializing/deserializing events.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The relay doesn't care HOW events are serialized — it just needs
//! something that implements the [`Codec`] trait.
//!
//! Browsers speak JSON, so [`JsonCodec`] is the only implementation today.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task the relay spawns.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use watchparty_protocol::{ClientEvent, Codec, JsonCodec};
///
/// let codec = JsonCodec;
///
/// let event: ClientEvent = codec
///     .decode(br#"{"event":"chat-message-posted","body":"hi"}"#)
///     .unwrap();
/// assert_eq!(event, ClientEvent::ChatMessagePosted { body: "hi".into() });
///
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: ClientEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
