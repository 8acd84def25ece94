//! Room lifecycle and membership consistency for the watch party relay.
//!
//! Rooms live in the shared store as three structures that must agree:
//! a membership set per room, a metadata hash per room, and one ranking
//! of public rooms by population. This crate is the only code that
//! writes them.
//!
//! # Key types
//!
//! - [`RoomDirectory`] — create/destroy rooms, membership, metadata
//! - [`PublicRoomIndex`] — population ranking of public rooms
//! - [`MembershipCoordinator`] — one-room-per-connection state machine
//!   sequencing directory and index calls for create/join/leave
//! - [`RoomError`] — `RoomNotFound`, `RoomNotPublic`, store failures

mod coordinator;
mod directory;
mod error;
mod index;
mod metadata;

pub use coordinator::{JoinOutcome, MembershipCoordinator};
pub use directory::RoomDirectory;
pub use error::RoomError;
pub use index::PublicRoomIndex;
pub use metadata::{RoomMetadata, fields};
