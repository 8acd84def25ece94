//! Membership coordinator: the one-room-per-connection state machine.
//!
//! Every create/join/leave is resolved here into an ordered sequence of
//! directory and index calls. Each step is awaited before the next one
//! starts, because later steps (destroy-if-empty above all) depend on
//! earlier writes having landed.
//!
//! # Switching rooms
//!
//! ```text
//! join(conn, target) while Joined(old):
//!   1. remove conn from old          ─┐
//!   2. old population -1 (if public)  ├─ vacate old room
//!   3. destroy old if now empty      ─┘
//!   4. add conn to target
//!   5. target population +1
//! ```
//!
//! Between steps 3 and 4 the connection is in neither room. It is never
//! counted in both.
//!
//! # Failures
//!
//! A store failure at step N aborts the sequence and is returned;
//! steps before N stay committed and the session reflects them. Nothing
//! here retries a whole sequence: repeating an increment could
//! double-count.

use tokio::sync::Mutex;
use watchparty_protocol::{ConnectionId, PublicRoomEntry, RoomDetails, RoomId};
use watchparty_session::{SessionState, SessionTracker};
use watchparty_store::{Store, StoreAdapter, StoreError};

use crate::{PublicRoomIndex, RoomDirectory, RoomError};

/// What a successful [`MembershipCoordinator::join`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The connection is now in the target room. `left` is the room it
    /// was moved out of, if any.
    Joined { left: Option<RoomId> },
    /// The connection was already in the target room; nothing changed.
    AlreadyJoined,
}

/// Sequences room membership changes for every connection on this relay.
///
/// Shared by all connection tasks (wrap it in an `Arc`). Calls for
/// different connections may run concurrently; calls for the same
/// connection are expected to arrive in order.
pub struct MembershipCoordinator<S: Store> {
    directory: RoomDirectory<S>,
    index: PublicRoomIndex<S>,
    /// Never locked across a store call.
    sessions: Mutex<SessionTracker>,
}

impl<S: Store> MembershipCoordinator<S> {
    /// Builds the directory, index, and session tracker over one store.
    pub fn new(store: StoreAdapter<S>) -> Self {
        let index = PublicRoomIndex::new(store.clone());
        let directory = RoomDirectory::new(store, index.clone());
        Self {
            directory,
            index,
            sessions: Mutex::new(SessionTracker::new()),
        }
    }

    pub fn directory(&self) -> &RoomDirectory<S> {
        &self.directory
    }

    pub fn index(&self) -> &PublicRoomIndex<S> {
        &self.index
    }

    /// Registers a new connection as `Unjoined`.
    pub async fn connect(&self, connection_id: ConnectionId) {
        self.sessions.lock().await.touch(connection_id);
    }

    /// The room `connection_id` is in, if any.
    pub async fn current_room(&self, connection_id: ConnectionId) -> Option<RoomId> {
        self.sessions.lock().await.current_room(connection_id)
    }

    pub async fn session_state(&self, connection_id: ConnectionId) -> SessionState {
        self.sessions.lock().await.state(connection_id)
    }

    /// Creates a room led by `connection_id` and moves the connection
    /// into it, leaving its previous room first.
    pub async fn create(
        &self,
        connection_id: ConnectionId,
        details: &RoomDetails,
    ) -> Result<RoomId, RoomError> {
        let previous = self.touch(connection_id).await;
        if let Some(old) = previous {
            self.vacate(connection_id, &old).await?;
        }

        let room_id = self.directory.create_room(connection_id, details).await?;
        self.sessions
            .lock()
            .await
            .set_joined(connection_id, room_id.clone());
        Ok(room_id)
    }

    /// Moves `connection_id` into `target`.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`] — `target` does not exist
    /// - [`RoomError::RoomNotPublic`] — `target` is private; this is
    ///   checked before anything else about the caller, so it holds even
    ///   for a connection already in the room
    /// - [`RoomError::Store`] — the store failed part-way
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        target: &RoomId,
    ) -> Result<JoinOutcome, RoomError> {
        let current = self.touch(connection_id).await;

        if !self.directory.room_exists(target).await? {
            tracing::debug!(%connection_id, room_id = %target, "join refused: no such room");
            return Err(RoomError::RoomNotFound(target.clone()));
        }
        if !self.directory.is_public(target).await? {
            tracing::debug!(%connection_id, room_id = %target, "join refused: room is private");
            return Err(RoomError::RoomNotPublic(target.clone()));
        }
        if current.as_ref() == Some(target) {
            return Ok(JoinOutcome::AlreadyJoined);
        }

        if let Some(old) = &current {
            self.vacate(connection_id, old).await?;
        }

        self.directory.add_member(target, connection_id).await?;
        self.sessions
            .lock()
            .await
            .set_joined(connection_id, target.clone());
        let population = self.index.increment(target, 1).await?;

        tracing::info!(
            %connection_id,
            room_id = %target,
            population,
            "connection joined room"
        );
        Ok(JoinOutcome::Joined { left: current })
    }

    /// Takes `connection_id` out of its room, destroying the room if it
    /// empties. Returns the room left, `None` if it was not in one.
    pub async fn leave(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<RoomId>, RoomError> {
        let Some(room_id) = self.current_room(connection_id).await else {
            return Ok(None);
        };
        self.vacate(connection_id, &room_id).await?;
        Ok(Some(room_id))
    }

    /// Leaves the current room and forgets the session. The session is
    /// cleared even if leaving fails; the store is then reconciled the
    /// next time that room is checked for emptiness.
    pub async fn disconnect(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<RoomId>, RoomError> {
        let result = self.leave(connection_id).await;
        self.sessions.lock().await.remove(connection_id);
        if let Err(e) = &result {
            tracing::warn!(%connection_id, error = %e, "leave on disconnect failed");
        }
        result
    }

    /// Everyone else in the caller's room, or `None` if the caller is
    /// not in a room.
    pub async fn recipients(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<(RoomId, Vec<ConnectionId>)>, RoomError> {
        let Some(room_id) = self.current_room(connection_id).await else {
            return Ok(None);
        };
        let mut members = self.directory.members(&room_id).await?;
        members.retain(|member| *member != connection_id);
        Ok(Some((room_id, members)))
    }

    /// The `limit` most populated public rooms with their listing data.
    /// Rooms destroyed between the ranking read and the metadata read
    /// are skipped.
    pub async fn public_rooms(
        &self,
        limit: usize,
    ) -> Result<Vec<PublicRoomEntry>, RoomError> {
        let ranked = self.index.top_public_rooms(limit).await?;
        let mut entries = Vec::with_capacity(ranked.len());
        for (room_id, population) in ranked {
            match self.directory.metadata(&room_id).await {
                Ok(meta) => entries.push(PublicRoomEntry {
                    room_id,
                    population,
                    currently_watching: meta.currently_watching,
                    preview_thumbnail: meta.preview_thumbnail,
                }),
                Err(RoomError::RoomNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }

    /// Ensures a session exists and returns its current room.
    async fn touch(&self, connection_id: ConnectionId) -> Option<RoomId> {
        self.sessions
            .lock()
            .await
            .touch(connection_id)
            .room()
            .cloned()
    }

    /// Steps 1–3 of a switch: remove, decrement, destroy-if-empty.
    async fn vacate(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), StoreError> {
        self.directory.remove_member(room_id, connection_id).await?;
        self.sessions.lock().await.set_unjoined(connection_id);

        // Private rooms are not indexed, so this is a no-op for them.
        let population = self.index.increment(room_id, -1).await?;
        let destroyed = self.directory.destroy_if_empty(room_id).await?;

        tracing::info!(
            %connection_id,
            %room_id,
            population,
            destroyed,
            "connection left room"
        );
        Ok(())
    }
}
