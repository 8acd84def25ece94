//! Connection session tracking for the watch party relay.
//!
//! A "session" is the relay's in-memory record of which room a
//! connection is currently in. It is never persisted: if the relay
//! restarts, every connection starts over as [`SessionState::Unjoined`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)  ← consults and updates sessions on create/join/leave
//!     ↕
//! Session layer (this crate)  ← connection → current room
//!     ↕
//! Protocol layer (below)  ← provides ConnectionId, RoomId
//! ```

mod session;
mod tracker;

pub use session::SessionState;
pub use tracker::SessionTracker;
