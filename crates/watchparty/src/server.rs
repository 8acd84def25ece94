//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a watch party relay. It ties
//! together all the layers: transport → protocol → room → store.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use watchparty_protocol::{Codec, JsonCodec};
use watchparty_room::MembershipCoordinator;
use watchparty_store::{Store, StoreAdapter, StoreConfig};
use watchparty_transport::{Handshake, PendingWebSocket, Transport, WebSocketTransport};

use crate::WatchPartyError;
use crate::handler::handle_connection;
use crate::relay::Registry;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState<S: Store, C: Codec> {
    pub(crate) rooms: MembershipCoordinator<S>,
    pub(crate) registry: Registry,
    pub(crate) codec: C,
    pub(crate) public_room_limit: usize,
    pub(crate) idle_timeout: Duration,
    /// Flips to `true` once the server starts shutting down.
    pub(crate) shutdown: watch::Receiver<bool>,
}

/// Resolves once `shutdown` reads `true` (or its server is gone).
pub(crate) async fn shutting_down(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,no_run
/// use watchparty::prelude::*;
///
/// # async fn start() -> Result<(), WatchPartyError> {
/// let server = RelayServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
    store_config: StoreConfig,
    public_room_limit: usize,
    idle_timeout: Duration,
    handshake_timeout: Duration,
    drain_timeout: Duration,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            store_config: StoreConfig::default(),
            public_room_limit: 20,
            idle_timeout: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the store namespace, timeout, and retry policy.
    pub fn store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    /// How many rooms `list-public-rooms` returns when the client does
    /// not ask for a limit. Also caps what a client may ask for.
    pub fn public_room_limit(mut self, limit: usize) -> Self {
        self.public_room_limit = limit;
        self
    }

    /// How long a connection may go without sending anything, pong
    /// replies included, before it is dropped. Quiet connections are
    /// pinged at half this interval.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// How long an accepted client may take to finish the WebSocket
    /// upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// How long shutdown waits for open connections to leave their rooms
    /// before abandoning them.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Binds the listener and wires the room layer over `store`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S: Store>(
        self,
        store: S,
    ) -> Result<RelayServer<S, JsonCodec>, WatchPartyError> {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_handshake_timeout(self.handshake_timeout);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = Arc::new(ServerState {
            rooms: MembershipCoordinator::new(StoreAdapter::new(store, self.store_config)),
            registry: Registry::new(),
            codec: JsonCodec,
            public_room_limit: self.public_room_limit,
            idle_timeout: self.idle_timeout,
            shutdown: shutdown_rx,
        });

        Ok(RelayServer {
            transport,
            state,
            shutdown: shutdown_tx,
            connections: JoinSet::new(),
            drain_timeout: self.drain_timeout,
        })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound watch party relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer<S: Store, C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, C>>,
    shutdown: watch::Sender<bool>,
    /// One task per accepted client, handshake included.
    connections: JoinSet<()>,
    drain_timeout: Duration,
}

impl<S, C> RelayServer<S, C>
where
    S: Store,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The membership coordinator shared by every connection.
    pub fn rooms(&self) -> &MembershipCoordinator<S> {
        &self.state.rooms
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until
    /// the process is terminated.
    pub async fn run(self) -> Result<(), WatchPartyError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then drains.
    ///
    /// Draining stops the listener, tells every connection to close, and
    /// waits up to the drain timeout for them to leave their rooms, so
    /// rooms held by this relay do not outlive it in the store.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), WatchPartyError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("watch party relay running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                () = self.accept_one() => {}
            }
        }

        self.drain().await;
        Ok(())
    }

    async fn accept_one(&mut self) {
        let pending = match self.transport.accept().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                return;
            }
        };

        let state = Arc::clone(&self.state);
        self.connections.spawn(serve_client(pending, state));

        // Reap finished tasks so the set only holds live connections.
        while self.connections.try_join_next().is_some() {}
    }

    async fn drain(self) {
        let Self {
            transport,
            shutdown,
            mut connections,
            drain_timeout,
            ..
        } = self;
        drop(transport);
        shutdown.send_replace(true);

        tracing::info!(open = connections.len(), "shutting down relay");
        let drained = tokio::time::timeout(drain_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "connections did not close in time, abandoning them"
            );
            connections.shutdown().await;
        }
    }
}

/// Completes the upgrade off the accept loop, then runs the handler.
async fn serve_client<S, C>(pending: PendingWebSocket, state: Arc<ServerState<S, C>>)
where
    S: Store,
    C: Codec,
{
    let connection_id = pending.id();
    let peer = pending.peer_addr();
    let upgraded = tokio::select! {
        upgraded = pending.complete() => upgraded,
        () = shutting_down(state.shutdown.clone()) => return,
    };
    let conn = match upgraded {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(%connection_id, %peer, error = %e, "rejected client");
            return;
        }
    };
    if let Err(e) = handle_connection(conn, state).await {
        tracing::debug!(%connection_id, error = %e, "connection ended with error");
    }
}
