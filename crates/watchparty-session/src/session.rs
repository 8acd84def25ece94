//! The per-connection state machine.

use watchparty_protocol::RoomId;

/// Which room, if any, a connection is in.
///
/// ```text
///   Unjoined ──(create / join)──→ Joined(room)
///       ↑                             │  ↺ (join another room)
///       └──────────(leave)────────────┘
/// ```
///
/// There is no state for "in two rooms": switching rooms replaces the
/// room inside `Joined`, so the single-room rule holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unjoined,
    Joined(RoomId),
}

impl SessionState {
    /// The room this state points at, if any.
    pub fn room(&self) -> Option<&RoomId> {
        match self {
            Self::Unjoined => None,
            Self::Joined(room_id) => Some(room_id),
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unjoined() {
        assert_eq!(SessionState::default(), SessionState::Unjoined);
        assert!(!SessionState::default().is_joined());
        assert_eq!(SessionState::Unjoined.room(), None);
    }

    #[test]
    fn test_joined_exposes_room() {
        let room = RoomId::parse("abcdefghijkl").unwrap();
        let state = SessionState::Joined(room.clone());
        assert!(state.is_joined());
        assert_eq!(state.room(), Some(&room));
    }
}
