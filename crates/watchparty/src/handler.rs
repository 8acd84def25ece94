//! Per-connection handler: registration, event dispatch, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! so one connection's events are handled strictly in arrival order.
//! The flow is:
//!   1. Register the session and the outbound channel, send `connected`
//!   2. Loop: receive events → create / join / leave / chat / list
//!   3. On close, read error, idle timeout, or server shutdown →
//!      disconnect, awaited inline; the drop guard covers aborted tasks

use std::sync::Arc;

use tokio::sync::mpsc;
use watchparty_protocol::{
    ClientEvent, Codec, ConnectionId, JoinFailureReason, RoomId, ServerEvent,
};
use watchparty_room::RoomError;
use watchparty_store::Store;
use watchparty_transport::{Connection, TransportError, WebSocketConnection};

use crate::WatchPartyError;
use crate::relay::{Frame, FrameSender};
use crate::server::{ServerState, shutting_down};

/// Drop guard that detaches a connection if its handler never reaches
/// the inline cleanup (the task was aborted or panicked).
///
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async store calls.
struct SessionGuard<S: Store, C: Codec> {
    connection_id: ConnectionId,
    state: Arc<ServerState<S, C>>,
    armed: bool,
}

impl<S: Store, C: Codec> SessionGuard<S, C> {
    /// Removes the connection from the registry and its room, then
    /// disarms the guard.
    async fn detach(mut self) {
        self.armed = false;
        detach(&self.state, self.connection_id).await;
    }
}

impl<S: Store, C: Codec> Drop for SessionGuard<S, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move { detach(&state, connection_id).await });
    }
}

async fn detach<S: Store, C: Codec>(state: &ServerState<S, C>, connection_id: ConnectionId) {
    state.registry.unregister(connection_id).await;
    match state.rooms.disconnect(connection_id).await {
        Ok(Some(room_id)) => {
            tracing::debug!(%connection_id, %room_id, "left room on disconnect");
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(%connection_id, error = %e, "failed to leave room on disconnect");
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), WatchPartyError>
where
    S: Store,
    C: Codec,
{
    let connection_id = conn.id();
    let conn = Arc::new(conn);
    let (outbox, frames) = mpsc::unbounded_channel();

    state.rooms.connect(connection_id).await;
    state.registry.register(connection_id, outbox.clone()).await;
    let guard = SessionGuard {
        connection_id,
        state: Arc::clone(&state),
        armed: true,
    };
    tokio::spawn(write_frames(Arc::clone(&conn), frames));

    let connections = state.registry.len().await;
    tracing::info!(%connection_id, connections, "connection attached");

    let result = serve_events(&conn, &state, &outbox).await;
    guard.detach().await;
    result
}

/// Reads and answers events until the connection closes, goes idle, or
/// the server shuts down.
async fn serve_events<S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<S, C>,
    outbox: &FrameSender,
) -> Result<(), WatchPartyError>
where
    S: Store,
    C: Codec,
{
    let connection_id = conn.id();
    let keepalive = state.idle_timeout / 2;
    queue(&state.codec, outbox, &ServerEvent::Connected { connection_id })?;

    loop {
        let received = tokio::select! {
            received = tokio::time::timeout(keepalive, conn.recv()) => received,
            () = shutting_down(state.shutdown.clone()) => {
                tracing::info!(%connection_id, "closing for shutdown");
                return Ok(());
            }
        };
        let data = match received {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%connection_id, "connection closed cleanly");
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::debug!(%connection_id, error = %e, "recv error");
                return Ok(());
            }
            Err(_) => {
                // Nothing arrived for a while: give up, or make sure the
                // peer is still there.
                let idle = conn.idle_for();
                if idle >= state.idle_timeout {
                    tracing::info!(
                        %connection_id,
                        idle_ms = idle.as_millis() as u64,
                        "connection timed out"
                    );
                    return Ok(());
                }
                if let Err(e) = conn.ping().await {
                    tracing::debug!(%connection_id, error = %e, "ping failed");
                    return Ok(());
                }
                continue;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "failed to decode event");
                queue(
                    &state.codec,
                    outbox,
                    &ServerEvent::InvalidEvent {
                        message: e.to_string(),
                    },
                )?;
                continue;
            }
        };

        if let Some(response) = handle_event(state, connection_id, event).await? {
            queue(&state.codec, outbox, &response)?;
        }
    }
}

/// Dispatches one client event. Returns the reply for the caller, if
/// the event has one.
async fn handle_event<S, C>(
    state: &ServerState<S, C>,
    connection_id: ConnectionId,
    event: ClientEvent,
) -> Result<Option<ServerEvent>, WatchPartyError>
where
    S: Store,
    C: Codec,
{
    let response = match &event {
        ClientEvent::CreateRoom { .. } => {
            let details = event.room_details().unwrap_or_default();
            match state.rooms.create(connection_id, &details).await {
                Ok(room_id) => ServerEvent::RoomCreated { room_id },
                Err(e) => failure_event(connection_id, &e),
            }
        }

        ClientEvent::JoinRoom { room_id } => {
            // A malformed id cannot name an existing room.
            let Ok(room_id) = RoomId::parse(room_id) else {
                return Ok(Some(ServerEvent::join_failed(
                    JoinFailureReason::RoomNotFound,
                )));
            };
            match state.rooms.join(connection_id, &room_id).await {
                Ok(_) => ServerEvent::JoinSucceeded { room_id },
                Err(e) => failure_event(connection_id, &e),
            }
        }

        ClientEvent::LeaveRoom => match state.rooms.leave(connection_id).await {
            Ok(_) => ServerEvent::LeftRoom,
            Err(e) => failure_event(connection_id, &e),
        },

        ClientEvent::ChatMessagePosted { body } => {
            return relay_chat(state, connection_id, body).await;
        }

        ClientEvent::ListPublicRooms { limit } => {
            let limit = limit
                .unwrap_or(state.public_room_limit)
                .min(state.public_room_limit);
            match state.rooms.public_rooms(limit).await {
                Ok(rooms) => ServerEvent::PublicRooms { rooms },
                Err(e) => failure_event(connection_id, &e),
            }
        }
    };

    Ok(Some(response))
}

/// Delivers a chat message to every other member of the sender's room
/// attached to this relay. Messages from a connection outside any room
/// are dropped.
async fn relay_chat<S, C>(
    state: &ServerState<S, C>,
    connection_id: ConnectionId,
    body: &str,
) -> Result<Option<ServerEvent>, WatchPartyError>
where
    S: Store,
    C: Codec,
{
    let (room_id, recipients) = match state.rooms.recipients(connection_id).await {
        Ok(Some(found)) => found,
        Ok(None) => {
            tracing::debug!(%connection_id, "chat from unjoined connection dropped");
            return Ok(None);
        }
        Err(e) => return Ok(Some(failure_event(connection_id, &e))),
    };

    let frame: Frame = state
        .codec
        .encode(&ServerEvent::MessageCaptured {
            from: connection_id,
            body: body.to_owned(),
        })?
        .into();
    let reached = state.registry.send_to_all(&recipients, &frame).await;
    tracing::debug!(
        %connection_id,
        %room_id,
        members = recipients.len(),
        reached,
        "chat relayed"
    );
    Ok(None)
}

/// Maps a failed room operation to the event the caller sees.
fn failure_event(connection_id: ConnectionId, error: &RoomError) -> ServerEvent {
    match error.join_failure() {
        Some(reason) => ServerEvent::join_failed(reason),
        None => {
            tracing::warn!(%connection_id, error = %error, "store failure");
            ServerEvent::StoreError {
                message: error.to_string(),
            }
        }
    }
}

/// Encodes `event` and queues it on the caller's own outbound channel.
fn queue<C: Codec>(
    codec: &C,
    outbox: &FrameSender,
    event: &ServerEvent,
) -> Result<(), WatchPartyError> {
    let frame: Frame = codec.encode(event)?.into();
    outbox.send(frame).map_err(|_| {
        WatchPartyError::Transport(TransportError::ConnectionClosed(
            "writer stopped".into(),
        ))
    })
}

/// Drains a connection's outbound channel into its socket, then closes
/// the socket once every sender is gone.
async fn write_frames(
    conn: Arc<WebSocketConnection>,
    mut frames: mpsc::UnboundedReceiver<Frame>,
) {
    let connection_id = conn.id();
    while let Some(frame) = frames.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(%connection_id, error = %e, "send failed");
            return;
        }
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%connection_id, error = %e, "close failed");
    }
}
