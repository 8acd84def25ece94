//! Outbound delivery to the connections attached to this relay.
//!
//! Every connection task registers an unbounded sender here; a writer
//! task per connection drains the matching receiver into the socket.
//! Replies to the caller and chat from other members go through the same
//! channel, so each client sees its events in the order they were queued.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use watchparty_protocol::ConnectionId;

/// An encoded event shared between every recipient of a broadcast.
pub(crate) type Frame = Arc<[u8]>;

pub(crate) type FrameSender = mpsc::UnboundedSender<Frame>;

/// Connections local to this relay, by id.
#[derive(Default)]
pub(crate) struct Registry {
    peers: RwLock<HashMap<ConnectionId, FrameSender>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn register(&self, connection_id: ConnectionId, sender: FrameSender) {
        self.peers.write().await.insert(connection_id, sender);
    }

    pub(crate) async fn unregister(&self, connection_id: ConnectionId) {
        self.peers.write().await.remove(&connection_id);
    }

    /// Queues `frame` for every listed connection attached to this relay.
    /// Ids with no local connection (stale store entries, other relays)
    /// are skipped. Returns how many were reached.
    pub(crate) async fn send_to_all(&self, recipients: &[ConnectionId], frame: &Frame) -> usize {
        let peers = self.peers.read().await;
        recipients
            .iter()
            .filter_map(|id| peers.get(id))
            .filter(|sender| sender.send(Arc::clone(frame)).is_ok())
            .count()
    }

    pub(crate) async fn len(&self) -> usize {
        self.peers.read().await.len()
    }
}
