//! Connection termination for the watch party relay.
//!
//! The relay is written against [`Transport`] (something that yields
//! connections) and [`Connection`] (something that moves byte frames
//! both ways). [`WebSocketTransport`] is the implementation browsers use.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

use std::time::Duration;

mod error;
mod ids;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use ids::ConnectionIdAllocator;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

pub use watchparty_protocol::ConnectionId;

/// A listener handing out client connections, each with a fresh
/// [`ConnectionId`].
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client. The protocol handshake is left to the
    /// returned [`Handshake`], so a client that never completes it does
    /// not hold up the listener.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// An accepted client whose protocol handshake has not run yet.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    fn id(&self) -> ConnectionId;

    /// Runs the handshake, failing if it does not finish in time.
    async fn complete(self) -> Result<Self::Connection, Self::Error>;
}

/// One client connection carrying whole frames.
///
/// `send` and `recv` may be called concurrently from different tasks:
/// the relay reads a connection's events on one task while broadcasts
/// to it are written from another.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads the next frame, `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts a clean close. Frames queued before it are still flushed.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Asks the peer to prove it is alive. Its answer counts as inbound
    /// activity without reaching [`recv`](Connection::recv)'s caller.
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Time since the peer last sent any frame, control frames included.
    fn idle_for(&self) -> Duration;

    fn id(&self) -> ConnectionId;
}
