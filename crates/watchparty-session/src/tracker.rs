//! The session tracker: connection id → current room.
//!
//! # Concurrency note
//!
//! `SessionTracker` is NOT thread-safe by itself — it uses a plain
//! `HashMap`. The membership coordinator owns it behind a mutex and
//! never holds that lock across a store call. Each entry is written only
//! by its own connection's event sequence, so there is one writer per key.

use std::collections::HashMap;

use watchparty_protocol::{ConnectionId, RoomId};

use crate::SessionState;

/// In-memory table of connection sessions.
///
/// ## Lifecycle
///
/// ```text
/// first event ──→ touch() ──→ set_joined() / set_unjoined() ──→ remove()
///                  [Unjoined]        [Joined(room)]            (disconnect)
/// ```
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<ConnectionId, SessionState>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `connection_id`, creating an `Unjoined`
    /// one if this is the connection's first event.
    pub fn touch(&mut self, connection_id: ConnectionId) -> &SessionState {
        self.sessions.entry(connection_id).or_insert_with(|| {
            tracing::debug!(%connection_id, "session created");
            SessionState::Unjoined
        })
    }

    /// The current state. Unknown connections read as `Unjoined`.
    pub fn state(&self, connection_id: ConnectionId) -> SessionState {
        self.sessions
            .get(&connection_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The room `connection_id` is in, if any.
    pub fn current_room(&self, connection_id: ConnectionId) -> Option<RoomId> {
        self.sessions
            .get(&connection_id)
            .and_then(|s| s.room().cloned())
    }

    /// Records that `connection_id` is now in `room_id`, replacing any
    /// previous room.
    pub fn set_joined(&mut self, connection_id: ConnectionId, room_id: RoomId) {
        self.sessions
            .insert(connection_id, SessionState::Joined(room_id));
    }

    /// Records that `connection_id` is in no room. The session itself
    /// stays until [`remove`](Self::remove).
    pub fn set_unjoined(&mut self, connection_id: ConnectionId) {
        self.sessions
            .insert(connection_id, SessionState::Unjoined);
    }

    /// Forgets `connection_id` entirely. Returns its last state.
    pub fn remove(
        &mut self,
        connection_id: ConnectionId,
    ) -> Option<SessionState> {
        let removed = self.sessions.remove(&connection_id);
        if removed.is_some() {
            tracing::debug!(%connection_id, "session cleared");
        }
        removed
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.sessions.contains_key(&connection_id)
    }

    /// Number of tracked sessions (joined or not).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions currently joined to `room_id` on this relay.
    pub fn joined_count(&self, room_id: &RoomId) -> usize {
        self.sessions
            .values()
            .filter(|s| s.room() == Some(room_id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn room(raw: &str) -> RoomId {
        RoomId::parse(raw).unwrap()
    }

    #[test]
    fn test_touch_creates_unjoined_session_once() {
        let mut tracker = SessionTracker::new();
        assert_eq!(*tracker.touch(cid(1)), SessionState::Unjoined);
        tracker.set_joined(cid(1), room("aaaaaaaaaaaa"));

        // A second touch must not reset an existing session.
        assert!(tracker.touch(cid(1)).is_joined());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_unknown_connection_reads_as_unjoined() {
        let tracker = SessionTracker::new();
        assert_eq!(tracker.state(cid(9)), SessionState::Unjoined);
        assert_eq!(tracker.current_room(cid(9)), None);
        assert!(!tracker.contains(cid(9)));
    }

    #[test]
    fn test_set_joined_replaces_previous_room() {
        let mut tracker = SessionTracker::new();
        tracker.set_joined(cid(1), room("aaaaaaaaaaaa"));
        tracker.set_joined(cid(1), room("bbbbbbbbbbbb"));

        assert_eq!(tracker.current_room(cid(1)), Some(room("bbbbbbbbbbbb")));
        assert_eq!(tracker.joined_count(&room("aaaaaaaaaaaa")), 0);
        assert_eq!(tracker.joined_count(&room("bbbbbbbbbbbb")), 1);
    }

    #[test]
    fn test_set_unjoined_keeps_session() {
        let mut tracker = SessionTracker::new();
        tracker.set_joined(cid(1), room("aaaaaaaaaaaa"));
        tracker.set_unjoined(cid(1));
        assert!(tracker.contains(cid(1)));
        assert_eq!(tracker.current_room(cid(1)), None);
    }

    #[test]
    fn test_remove_returns_last_state() {
        let mut tracker = SessionTracker::new();
        tracker.set_joined(cid(1), room("aaaaaaaaaaaa"));
        assert_eq!(
            tracker.remove(cid(1)),
            Some(SessionState::Joined(room("aaaaaaaaaaaa")))
        );
        assert_eq!(tracker.remove(cid(1)), None);
        assert!(tracker.is_empty());
    }
}
