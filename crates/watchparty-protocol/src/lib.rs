//! Wire protocol for the watch party relay.
//!
//! This crate defines the "language" that browsers and the relay speak:
//!
//! - **Identifiers** ([`ConnectionId`], [`RoomId`]) — who is talking and
//!   where they are.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — the JSON messages
//!   that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those events are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! The protocol layer knows nothing about the shared store or room
//! membership. It only knows how to name things and how to serialize them.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent) → Room layer (membership)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, ConnectionId, JoinFailureReason, PublicRoomEntry,
    RoomDetails, RoomId, ServerEvent, ROOM_ID_LEN,
};
