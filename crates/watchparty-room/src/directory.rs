//! Room directory: room id → membership set + metadata hash.
//!
//! The directory creates rooms, answers "does it exist / what is it",
//! and is the only code that ever deletes a room ([`destroy_if_empty`]).
//! Membership mutations ([`add_member`], [`remove_member`]) touch the set
//! only; keeping the public index in step is the coordinator's job.
//!
//! [`destroy_if_empty`]: RoomDirectory::destroy_if_empty
//! [`add_member`]: RoomDirectory::add_member
//! [`remove_member`]: RoomDirectory::remove_member

use std::collections::HashMap;

use watchparty_protocol::{ConnectionId, RoomDetails, RoomId};
use watchparty_store::{Store, StoreAdapter, StoreError};

use crate::metadata::parse_flag;
use crate::{PublicRoomIndex, RoomError, RoomMetadata, fields};

/// How a connection id is written into a membership set.
fn member_key(connection_id: ConnectionId) -> String {
    connection_id.into_inner().to_string()
}

/// Owns the per-room membership sets and metadata hashes.
#[derive(Debug, Clone)]
pub struct RoomDirectory<S: Store> {
    store: StoreAdapter<S>,
    index: PublicRoomIndex<S>,
}

impl<S: Store> RoomDirectory<S> {
    pub fn new(store: StoreAdapter<S>, index: PublicRoomIndex<S>) -> Self {
        Self { store, index }
    }

    /// Creates a room with `leader` as its only member and returns the
    /// new id. Public rooms are registered with the index at score 1.
    ///
    /// The metadata hash is written before the membership set, so any
    /// reader that sees the room exist can also read its metadata.
    pub async fn create_room(
        &self,
        leader: ConnectionId,
        details: &RoomDetails,
    ) -> Result<RoomId, StoreError> {
        let room_id = RoomId::generate();
        let keys = self.store.keys();
        let metadata = RoomMetadata::new(leader, details);

        self.store
            .hset_multiple(&keys.room_details(&room_id), &metadata.to_fields())
            .await?;
        self.store
            .sadd(&keys.room_population(&room_id), &member_key(leader))
            .await?;
        if details.is_public {
            self.index.register(&room_id, 1).await?;
        }

        tracing::info!(
            %room_id,
            %leader,
            is_public = details.is_public,
            "room created"
        );
        Ok(room_id)
    }

    /// Whether the room's membership set exists.
    pub async fn room_exists(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        self.store
            .exists(&self.store.keys().room_population(room_id))
            .await
    }

    /// Reads the requested metadata fields. Fields absent from the hash
    /// are absent from the result.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`] if the metadata hash does not exist,
    /// e.g. because the room was destroyed concurrently.
    pub async fn get_metadata(
        &self,
        room_id: &RoomId,
        requested: &[&str],
    ) -> Result<HashMap<String, String>, RoomError> {
        let key = self.store.keys().room_details(room_id);
        let names: Vec<String> =
            requested.iter().map(|f| (*f).to_owned()).collect();
        let values = self.store.hmget(&key, &names).await?;

        let found: HashMap<String, String> = names
            .into_iter()
            .zip(values)
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();

        if found.is_empty() && !self.store.exists(&key).await? {
            return Err(RoomError::RoomNotFound(room_id.clone()));
        }
        Ok(found)
    }

    /// Reads the full metadata hash as a [`RoomMetadata`].
    pub async fn metadata(&self, room_id: &RoomId) -> Result<RoomMetadata, RoomError> {
        let map = self.get_metadata(room_id, &fields::ALL).await?;
        Ok(RoomMetadata::from_fields(&map))
    }

    /// Whether the room is flagged public. A missing flag reads as private.
    pub async fn is_public(&self, room_id: &RoomId) -> Result<bool, RoomError> {
        let map = self.get_metadata(room_id, &[fields::IS_PUBLIC]).await?;
        Ok(parse_flag(map.get(fields::IS_PUBLIC)))
    }

    /// Deletes the room if its membership set is empty.
    ///
    /// Cardinality is read from the store immediately before deleting,
    /// never from a cached count; a non-zero read always wins. Returns
    /// `true` if anything was destroyed.
    pub async fn destroy_if_empty(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        let keys = self.store.keys();
        let population = self.store.scard(&keys.room_population(room_id)).await?;
        if population > 0 {
            tracing::trace!(%room_id, population, "room still occupied");
            return Ok(false);
        }

        // The outcome is read before deleting: a retried DEL whose first
        // attempt landed reports zero keys.
        let existed = self.store.exists(&keys.room_details(room_id)).await?;
        self.store
            .del(&[keys.room_population(room_id), keys.room_details(room_id)])
            .await?;
        let unindexed = self.index.remove(room_id).await?;

        if !existed {
            if unindexed {
                tracing::warn!(
                    %room_id,
                    consistency_warning = true,
                    "removed public index entry of a room with no metadata"
                );
            }
            return Ok(unindexed);
        }

        tracing::info!(%room_id, "room destroyed");
        Ok(true)
    }

    /// Adds a connection to the membership set. Returns `true` if it was
    /// not already a member.
    pub async fn add_member(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
    ) -> Result<bool, StoreError> {
        self.store
            .sadd(
                &self.store.keys().room_population(room_id),
                &member_key(connection_id),
            )
            .await
    }

    /// Removes a connection from the membership set. Returns `true` if
    /// it was a member.
    pub async fn remove_member(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
    ) -> Result<bool, StoreError> {
        self.store
            .srem(
                &self.store.keys().room_population(room_id),
                &member_key(connection_id),
            )
            .await
    }

    /// Live population of a room (0 for a destroyed room).
    pub async fn population(&self, room_id: &RoomId) -> Result<u64, StoreError> {
        self.store
            .scard(&self.store.keys().room_population(room_id))
            .await
    }

    /// Every connection currently in the room.
    pub async fn members(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<ConnectionId>, StoreError> {
        let raw = self
            .store
            .smembers(&self.store.keys().room_population(room_id))
            .await?;
        Ok(raw
            .into_iter()
            .filter_map(|member| match member.parse::<u64>() {
                Ok(id) => Some(ConnectionId::new(id)),
                Err(_) => {
                    tracing::warn!(%room_id, member, "skipping malformed member");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use watchparty_store::{MemoryStore, StoreConfig};

    use super::*;

    fn directory() -> (MemoryStore, RoomDirectory<MemoryStore>) {
        let store = MemoryStore::new();
        let adapter = StoreAdapter::new(store.clone(), StoreConfig::default());
        let index = PublicRoomIndex::new(adapter.clone());
        (store, RoomDirectory::new(adapter, index))
    }

    fn details(is_public: bool) -> RoomDetails {
        RoomDetails {
            is_public,
            currently_watching: "movie".into(),
            preview_thumbnail: "x".into(),
        }
    }

    #[tokio::test]
    async fn test_create_room_writes_membership_and_metadata() {
        let (_, dir) = directory();
        let leader = ConnectionId::new(1);
        let room = dir.create_room(leader, &details(false)).await.unwrap();

        assert!(dir.room_exists(&room).await.unwrap());
        assert_eq!(dir.members(&room).await.unwrap(), vec![leader]);

        let meta = dir.metadata(&room).await.unwrap();
        assert!(!meta.is_public);
        assert_eq!(meta.currently_watching, "movie");
        assert_eq!(meta.preview_thumbnail, "x");
        assert_eq!(meta.leader, Some(leader));
    }

    #[tokio::test]
    async fn test_get_metadata_partial_read() {
        let (_, dir) = directory();
        let room = dir
            .create_room(ConnectionId::new(1), &details(true))
            .await
            .unwrap();
        let map = dir
            .get_metadata(&room, &[fields::CURRENTLY_WATCHING, "nope"])
            .await
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[fields::CURRENTLY_WATCHING], "movie");
    }

    #[tokio::test]
    async fn test_get_metadata_of_missing_room_is_not_found() {
        let (_, dir) = directory();
        let room = RoomId::generate();
        let err = dir.get_metadata(&room, &[fields::IS_PUBLIC]).await;
        assert!(matches!(err, Err(RoomError::RoomNotFound(r)) if r == room));
    }

    #[tokio::test]
    async fn test_destroy_if_empty_keeps_occupied_room() {
        let (_, dir) = directory();
        let room = dir
            .create_room(ConnectionId::new(1), &details(true))
            .await
            .unwrap();
        assert!(!dir.destroy_if_empty(&room).await.unwrap());
        assert!(dir.room_exists(&room).await.unwrap());
    }

    #[tokio::test]
    async fn test_destroy_if_empty_removes_every_trace() {
        let (store, dir) = directory();
        let leader = ConnectionId::new(1);
        let room = dir.create_room(leader, &details(true)).await.unwrap();

        assert!(dir.remove_member(&room, leader).await.unwrap());
        assert!(dir.destroy_if_empty(&room).await.unwrap());

        assert!(!dir.room_exists(&room).await.unwrap());
        assert!(dir.metadata(&room).await.is_err());
        assert_eq!(store.keys().await, vec!["watch-party:public_rooms_seq"]);

        // Destroying twice is harmless.
        assert!(!dir.destroy_if_empty(&room).await.unwrap());
    }

    #[tokio::test]
    async fn test_destroy_reports_success_when_delete_reply_is_lost() {
        let (store, dir) = directory();
        let leader = ConnectionId::new(1);
        let room = dir.create_room(leader, &details(false)).await.unwrap();
        assert!(dir.remove_member(&room, leader).await.unwrap());

        // SCARD and EXISTS answer; DEL applies but its reply is lost, so
        // the retry finds nothing left to delete.
        store.lose_replies_after(2, 1).await;
        assert!(dir.destroy_if_empty(&room).await.unwrap());

        assert!(!dir.room_exists(&room).await.unwrap());
        assert!(dir.metadata(&room).await.is_err());
    }

    #[tokio::test]
    async fn test_members_skip_malformed_entries() {
        let (store, dir) = directory();
        let room = dir
            .create_room(ConnectionId::new(4), &details(false))
            .await
            .unwrap();
        store
            .sadd(&format!("watch-party:room_population:{room}"), "garbage")
            .await
            .unwrap();
        assert_eq!(dir.members(&room).await.unwrap(), vec![ConnectionId::new(4)]);
        assert_eq!(dir.population(&room).await.unwrap(), 2);
    }
}
