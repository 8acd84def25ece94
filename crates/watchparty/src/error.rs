//! Unified error type for the watch party relay.

use watchparty_protocol::ProtocolError;
use watchparty_room::RoomError;
use watchparty_store::StoreError;
use watchparty_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WatchPartyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed room id).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The shared store could not be reached or misbehaved.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A room-level error (not found, not public, store failure mid-way).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use watchparty_protocol::RoomId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let wp_err: WatchPartyError = err.into();
        assert!(matches!(wp_err, WatchPartyError::Transport(_)));
        assert!(wp_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidRoomId("??".into());
        let wp_err: WatchPartyError = err.into();
        assert!(matches!(wp_err, WatchPartyError::Protocol(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::Timeout(Duration::from_secs(2));
        let wp_err: WatchPartyError = err.into();
        assert!(matches!(wp_err, WatchPartyError::Store(_)));
    }

    #[test]
    fn test_from_room_error_keeps_user_facing_text() {
        let room = RoomId::parse("abcdefghijkl").unwrap();
        let wp_err: WatchPartyError = RoomError::RoomNotPublic(room).into();
        assert!(matches!(wp_err, WatchPartyError::Room(_)));
        assert_eq!(wp_err.to_string(), "Room is not public");
    }
}
