//! # Watch Party
//!
//! Room relay for synchronized viewing sessions.
//!
//! Browsers connect over WebSocket, create or join rooms, and chat with
//! the other members of their room. Room membership, metadata, and the
//! ranking of public rooms by population live in a shared store (Redis
//! in production) so that several relay processes and restarts see the
//! same rooms.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use watchparty::prelude::*;
//!
//! # async fn start() -> Result<(), WatchPartyError> {
//! let server = RelayServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(MemoryStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod relay;
mod server;

pub use error::WatchPartyError;
pub use server::{RelayServer, RelayServerBuilder};

/// Everything needed to embed a relay.
pub mod prelude {
    pub use crate::{RelayServer, RelayServerBuilder, WatchPartyError};
    pub use watchparty_protocol::{
        ClientEvent, Codec, ConnectionId, JoinFailureReason, JsonCodec,
        PublicRoomEntry, RoomDetails, RoomId, ServerEvent,
    };
    pub use watchparty_room::{JoinOutcome, MembershipCoordinator, RoomError};
    pub use watchparty_session::SessionState;
    pub use watchparty_store::{
        MemoryStore, RedisStore, Store, StoreConfig, StoreError,
    };
}
