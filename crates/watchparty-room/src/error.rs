//! Error types for the room layer.

use watchparty_protocol::{JoinFailureReason, RoomId};
use watchparty_store::StoreError;

/// Errors that can occur during room operations.
///
/// The two validation variants display the exact text shown to users.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (never did, or was destroyed).
    #[error("Room does not exist")]
    RoomNotFound(RoomId),

    /// The room exists but is private, so it cannot be joined by id.
    #[error("Room is not public")]
    RoomNotPublic(RoomId),

    /// The shared store failed. Fatal to this request only.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RoomError {
    /// The wire-level reason for a refused join, if this is one.
    pub fn join_failure(&self) -> Option<JoinFailureReason> {
        match self {
            Self::RoomNotFound(_) => Some(JoinFailureReason::RoomNotFound),
            Self::RoomNotPublic(_) => Some(JoinFailureReason::RoomNotPublic),
            Self::Store(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::parse("abcdefghijkl").unwrap()
    }

    #[test]
    fn test_validation_errors_use_user_facing_text() {
        assert_eq!(
            RoomError::RoomNotFound(room()).to_string(),
            "Room does not exist"
        );
        assert_eq!(
            RoomError::RoomNotPublic(room()).to_string(),
            "Room is not public"
        );
    }

    #[test]
    fn test_join_failure_mapping() {
        assert_eq!(
            RoomError::RoomNotFound(room()).join_failure(),
            Some(JoinFailureReason::RoomNotFound)
        );
        assert_eq!(
            RoomError::RoomNotPublic(room()).join_failure(),
            Some(JoinFailureReason::RoomNotPublic)
        );
        let store = RoomError::from(StoreError::Unavailable("down".into()));
        assert_eq!(store.join_failure(), None);
    }
}
