//! Namespaced key layout.
//!
//! ```text
//! <ns>:room_population:<roomId>    set of connection ids
//! <ns>:room_details:<roomId>       hash of room metadata
//! <ns>:public_rooms                sorted set roomId → population
//! <ns>:public_rooms_registered     sorted set roomId → registration seq
//! <ns>:public_rooms_seq            registration counter
//! ```

use watchparty_protocol::RoomId;

/// Builds every key the relay reads or writes, under one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Membership set of a room.
    pub fn room_population(&self, room_id: &RoomId) -> String {
        format!("{}:room_population:{}", self.namespace, room_id)
    }

    /// Metadata hash of a room.
    pub fn room_details(&self, room_id: &RoomId) -> String {
        format!("{}:room_details:{}", self.namespace, room_id)
    }

    /// Population ranking of public rooms.
    pub fn public_rooms(&self) -> String {
        format!("{}:public_rooms", self.namespace)
    }

    /// Registration order of public rooms, used to break population ties.
    pub fn public_rooms_registered(&self) -> String {
        format!("{}:public_rooms_registered", self.namespace)
    }

    pub fn public_rooms_seq(&self) -> String {
        format!("{}:public_rooms_seq", self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = KeySpace::new("watch-party");
        let room = RoomId::parse("abcdefghijkl").unwrap();
        assert_eq!(
            keys.room_population(&room),
            "watch-party:room_population:abcdefghijkl"
        );
        assert_eq!(
            keys.room_details(&room),
            "watch-party:room_details:abcdefghijkl"
        );
        assert_eq!(keys.public_rooms(), "watch-party:public_rooms");
        assert_eq!(
            keys.public_rooms_registered(),
            "watch-party:public_rooms_registered"
        );
        assert_eq!(keys.public_rooms_seq(), "watch-party:public_rooms_seq");
    }
}
