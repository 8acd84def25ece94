//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{
    Connection, ConnectionId, ConnectionIdAllocator, Handshake, Transport, TransportError,
};

/// How long a client gets to finish the WebSocket upgrade by default.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<TcpStream>;

fn send_error(e: WsError) -> TransportError {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            TransportError::ConnectionClosed(e.to_string())
        }
        other => TransportError::SendFailed(other.to_string()),
    }
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    ids: ConnectionIdAllocator,
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::Bind {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            ids: ConnectionIdAllocator::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    /// Sets how long an accepted client may take to complete the upgrade.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the address the listener is bound to (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Pending = PendingWebSocket;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = self.ids.next_id();
        tracing::trace!(%id, %addr, "accepted TCP connection");
        Ok(PendingWebSocket {
            id,
            addr,
            stream,
            timeout: self.handshake_timeout,
        })
    }
}

/// A TCP client that has not completed the WebSocket upgrade yet.
pub struct PendingWebSocket {
    id: ConnectionId,
    addr: SocketAddr,
    stream: TcpStream,
    timeout: Duration,
}

impl PendingWebSocket {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Handshake for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn complete(self) -> Result<Self::Connection, Self::Error> {
        let addr = self.addr;
        let ws = tokio::time::timeout(
            self.timeout,
            tokio_tungstenite::accept_async(self.stream),
        )
        .await
        .map_err(|_| TransportError::UpgradeFailed(format!("{addr}: handshake timed out")))?
        .map_err(|e| TransportError::UpgradeFailed(format!("{addr}: {e}")))?;

        tracing::debug!(id = %self.id, %addr, "accepted WebSocket connection");
        Ok(WebSocketConnection::new(self.id, ws))
    }
}

/// A single WebSocket connection.
///
/// The socket is split so a task blocked in [`recv`](Connection::recv)
/// never holds up a [`send`](Connection::send) from another task.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    opened: Instant,
    /// Milliseconds after `opened` at which the peer last sent a frame.
    last_seen_ms: AtomicU64,
}

impl WebSocketConnection {
    fn new(id: ConnectionId, ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            opened: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let now = self.opened.elapsed().as_millis() as u64;
        self.last_seen_ms.fetch_max(now, Ordering::Relaxed);
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Sends UTF-8 payloads as text frames (what browsers expect for
    /// JSON) and anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(send_error)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            let next = stream.next().await;
            if matches!(next, Some(Ok(_))) {
                self.touch();
            }
            match next {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Pings are answered by tungstenite on the next read or write.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(send_error)
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(send_error)
    }

    fn idle_for(&self) -> Duration {
        let last_seen = Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        self.opened.elapsed().saturating_sub(last_seen)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
