//! Core protocol types for the relay's wire format.
//!
//! This module defines every type that travels "on the wire" between a
//! browser and the relay, plus the two identifiers that the room layer
//! writes into the shared store.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier for one client connection.
///
/// This is a "newtype wrapper" around `u64`: you can't accidentally pass
/// a raw number where a connection is expected. The transport layer
/// allocates these; the room layer stores them (as decimal strings) in
/// each room's membership set.
///
/// `#[serde(transparent)]` serializes `ConnectionId(42)` as just `42`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Number of characters in a room identifier.
pub const ROOM_ID_LEN: usize = 12;

/// URL-safe alphabet used for room identifiers (64 symbols, 6 bits each).
const ROOM_ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// A globally unique, URL-safe room identifier.
///
/// Twelve symbols from a 64-character alphabet give 2^72 possible ids,
/// so two independently generated ids colliding is not a practical
/// concern. Ids are shared as links, which is why they avoid `+` and `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..ROOM_ID_LEN)
            .map(|_| {
                ROOM_ID_ALPHABET[rng.random_range(0..ROOM_ID_ALPHABET.len())]
                    as char
            })
            .collect();
        Self(id)
    }

    /// Validates an identifier received from a client.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomId`] if the input is not
    /// exactly [`ROOM_ID_LEN`] characters from the URL-safe alphabet.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let valid = raw.len() == ROOM_ID_LEN
            && raw.bytes().all(|b| ROOM_ID_ALPHABET.contains(&b));
        if valid {
            Ok(Self(raw.to_owned()))
        } else {
            Err(ProtocolError::InvalidRoomId(raw.to_owned()))
        }
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Room payloads
// ---------------------------------------------------------------------------

/// What a client sends when it creates a room.
///
/// The leader is deliberately absent: the relay always records the
/// creating connection as leader, the client cannot nominate someone else.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetails {
    /// Whether the room is listed and joinable by id.
    pub is_public: bool,
    /// Freeform title of whatever is playing.
    #[serde(default)]
    pub currently_watching: String,
    /// URI of a preview image shown in room listings.
    #[serde(default)]
    pub preview_thumbnail: String,
}

/// One row of the public room listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoomEntry {
    pub room_id: RoomId,
    /// Live population according to the public room index.
    pub population: u64,
    pub currently_watching: String,
    pub preview_thumbnail: String,
}

/// Why a join request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinFailureReason {
    RoomNotFound,
    RoomNotPublic,
}

impl JoinFailureReason {
    /// The user-facing explanation sent alongside the reason code.
    pub fn message(self) -> &'static str {
        match self {
            Self::RoomNotFound => "Room does not exist",
            Self::RoomNotPublic => "Room is not public",
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Client → relay events.
///
/// `#[serde(tag = "event", rename_all = "kebab-case")]` produces internally
/// tagged JSON such as `{ "event": "join-room", "roomId": "..." }`, which
/// is what browser code emits most naturally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Create a room and become its leader (and first member).
    CreateRoom {
        is_public: bool,
        #[serde(default)]
        currently_watching: String,
        #[serde(default)]
        preview_thumbnail: String,
    },

    /// Move into an existing public room.
    ///
    /// The id is kept as a raw string here; the relay validates it so
    /// that a malformed id is reported as "room not found" rather than
    /// as a protocol error.
    JoinRoom { room_id: String },

    /// Leave the current room, if any.
    LeaveRoom,

    /// Post a chat message to everyone else in the current room.
    ChatMessagePosted { body: String },

    /// Ask for the most populated public rooms.
    ListPublicRooms {
        #[serde(default)]
        limit: Option<usize>,
    },
}

impl ClientEvent {
    /// Extracts the room details from a `CreateRoom` event.
    pub fn room_details(&self) -> Option<RoomDetails> {
        match self {
            Self::CreateRoom {
                is_public,
                currently_watching,
                preview_thumbnail,
            } => Some(RoomDetails {
                is_public: *is_public,
                currently_watching: currently_watching.clone(),
                preview_thumbnail: preview_thumbnail.clone(),
            }),
            _ => None,
        }
    }
}

/// Relay → client events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// First event on every connection.
    Connected { connection_id: ConnectionId },

    /// The room the caller asked for exists and the caller is in it.
    RoomCreated { room_id: RoomId },

    JoinSucceeded { room_id: RoomId },

    JoinFailed {
        reason: JoinFailureReason,
        message: String,
    },

    LeftRoom,

    /// A chat message relayed from another member of the room.
    MessageCaptured { from: ConnectionId, body: String },

    PublicRooms { rooms: Vec<PublicRoomEntry> },

    /// The shared store could not complete the request.
    StoreError { message: String },

    /// The client sent something the relay could not decode.
    InvalidEvent { message: String },
}

impl ServerEvent {
    /// Builds the failure event for a refused join.
    pub fn join_failed(reason: JoinFailureReason) -> Self {
        Self::JoinFailed {
            reason,
            message: reason.message().to_owned(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client parses these shapes by hand, so the tests pin
    //! the exact JSON our serde attributes produce.

    use super::*;

    #[test]
    fn test_connection_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ConnectionId::new(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_generated_room_ids_are_url_safe_and_twelve_chars() {
        for _ in 0..64 {
            let id = RoomId::generate();
            assert_eq!(id.as_str().len(), ROOM_ID_LEN);
            assert!(RoomId::parse(id.as_str()).is_ok());
        }
    }

    #[test]
    fn test_generated_room_ids_differ() {
        assert_ne!(RoomId::generate(), RoomId::generate());
    }

    #[test]
    fn test_room_id_parse_rejects_wrong_length() {
        assert!(matches!(
            RoomId::parse("short"),
            Err(ProtocolError::InvalidRoomId(_))
        ));
        assert!(RoomId::parse("nonexistent-id").is_err());
    }

    #[test]
    fn test_room_id_parse_rejects_non_url_safe_chars() {
        assert!(RoomId::parse("abc/def+ghi=").is_err());
        assert!(RoomId::parse("abcdef_ghi-1").is_ok());
    }

    #[test]
    fn test_create_room_json_format() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"create-room","isPublic":true,"currentlyWatching":"movie","previewThumbnail":"x"}"#,
        )
        .unwrap();
        let details = event.room_details().unwrap();
        assert!(details.is_public);
        assert_eq!(details.currently_watching, "movie");
        assert_eq!(details.preview_thumbnail, "x");
    }

    #[test]
    fn test_create_room_defaults_optional_strings() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"create-room","isPublic":false}"#)
                .unwrap();
        assert_eq!(event.room_details(), Some(RoomDetails::default()));
    }

    #[test]
    fn test_join_room_json_format() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"join-room","roomId":"abcdefghijkl"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room_id: "abcdefghijkl".into()
            }
        );
        assert_eq!(event.room_details(), None);
    }

    #[test]
    fn test_list_public_rooms_limit_is_optional() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"list-public-rooms"}"#).unwrap();
        assert_eq!(event, ClientEvent::ListPublicRooms { limit: None });
    }

    #[test]
    fn test_join_failed_json_format() {
        let event = ServerEvent::join_failed(JoinFailureReason::RoomNotPublic);
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "join-failed");
        assert_eq!(json["reason"], "RoomNotPublic");
        assert_eq!(json["message"], "Room is not public");
    }

    #[test]
    fn test_message_captured_json_format() {
        let event = ServerEvent::MessageCaptured {
            from: ConnectionId::new(3),
            body: "hello".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message-captured");
        assert_eq!(json["from"], 3);
        assert_eq!(json["body"], "hello");
    }

    #[test]
    fn test_public_rooms_json_uses_camel_case() {
        let event = ServerEvent::PublicRooms {
            rooms: vec![PublicRoomEntry {
                room_id: RoomId::parse("abcdefghijkl").unwrap(),
                population: 2,
                currently_watching: "movie".into(),
                preview_thumbnail: "x".into(),
            }],
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["rooms"][0]["roomId"], "abcdefghijkl");
        assert_eq!(json["rooms"][0]["population"], 2);
        assert_eq!(json["rooms"][0]["currentlyWatching"], "movie");
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            JoinFailureReason::RoomNotFound.message(),
            "Room does not exist"
        );
        assert_eq!(
            JoinFailureReason::RoomNotPublic.message(),
            "Room is not public"
        );
    }
}
