//! Population ranking of public rooms.
//!
//! Backed by the `public_rooms` sorted set (room → live population).
//! A second sorted set, `public_rooms_registered`, records the order in
//! which rooms were registered so that rooms with equal population list
//! the most recently created first. This component never reads or writes
//! room metadata or membership.

use watchparty_protocol::RoomId;
use watchparty_store::{Store, StoreAdapter, StoreError};

/// Ranked view over public rooms.
#[derive(Debug, Clone)]
pub struct PublicRoomIndex<S: Store> {
    store: StoreAdapter<S>,
}

impl<S: Store> PublicRoomIndex<S> {
    pub fn new(store: StoreAdapter<S>) -> Self {
        Self { store }
    }

    /// Adds a room to the ranking with `initial_score` (1 for a room
    /// that was just created by its first member).
    pub async fn register(
        &self,
        room_id: &RoomId,
        initial_score: u64,
    ) -> Result<(), StoreError> {
        let keys = self.store.keys();
        let seq = self.store.incr(&keys.public_rooms_seq()).await?;
        self.store
            .zadd(&keys.public_rooms_registered(), room_id.as_str(), seq as f64)
            .await?;
        self.store
            .zadd(&keys.public_rooms(), room_id.as_str(), initial_score as f64)
            .await?;
        tracing::debug!(%room_id, initial_score, "public room registered");
        Ok(())
    }

    /// Adjusts a room's population score by `delta`.
    ///
    /// Rooms that are not indexed (private or already destroyed) are left
    /// untouched and `None` is returned. A score that would drop below
    /// zero means an upstream bookkeeping bug: it is clamped to zero and
    /// logged as a consistency warning.
    pub async fn increment(
        &self,
        room_id: &RoomId,
        delta: i64,
    ) -> Result<Option<u64>, StoreError> {
        let key = self.store.keys().public_rooms();
        let Some(score) = self
            .store
            .zadd_incr_existing(&key, room_id.as_str(), delta as f64)
            .await?
        else {
            tracing::trace!(%room_id, delta, "room not indexed, increment skipped");
            return Ok(None);
        };

        if score < 0.0 {
            tracing::warn!(
                %room_id,
                score,
                delta,
                consistency_warning = true,
                "public room score went negative, clamping to zero"
            );
            // XX: a concurrent destroy may have removed the entry since.
            self.store.zadd_existing(&key, room_id.as_str(), 0.0).await?;
            return Ok(Some(0));
        }
        Ok(Some(score as u64))
    }

    /// Removes a room from the ranking. Returns `true` if it was indexed.
    pub async fn remove(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        let keys = self.store.keys();
        let removed = self
            .store
            .zrem(&keys.public_rooms(), room_id.as_str())
            .await?;
        self.store
            .zrem(&keys.public_rooms_registered(), room_id.as_str())
            .await?;
        if removed {
            tracing::debug!(%room_id, "public room unregistered");
        }
        Ok(removed)
    }

    /// Current score of a room, `None` if it is not indexed.
    pub async fn score(&self, room_id: &RoomId) -> Result<Option<u64>, StoreError> {
        let score = self
            .store
            .zscore(&self.store.keys().public_rooms(), room_id.as_str())
            .await?;
        Ok(score.map(clamp_score))
    }

    /// The `limit` most populated public rooms, highest first. Equal
    /// populations are ordered most recently registered first.
    ///
    /// Costs a handful of store calls however many rooms are listed:
    /// registration ranks are read with one `ZMSCORE` per batch.
    pub async fn top_public_rooms(
        &self,
        limit: usize,
    ) -> Result<Vec<(RoomId, u64)>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let keys = self.store.keys();

        let window = self
            .store
            .zrevrange_withscores(&keys.public_rooms(), 0, limit as isize - 1)
            .await?;

        // The store orders ties by member name, not by recency, so a full
        // window may end part-way through a run of equal scores. Rooms at
        // that boundary score are re-picked by recency.
        let boundary = window
            .last()
            .map(|(_, score)| *score)
            .filter(|_| window.len() == limit);
        let (above, tied) = match boundary {
            Some(boundary) => {
                let (above, at_boundary): (Vec<_>, Vec<_>) =
                    window.into_iter().partition(|(_, score)| *score > boundary);
                let wanted = limit - above.len();
                let fallback: Vec<String> =
                    at_boundary.into_iter().map(|(member, _)| member).collect();
                let tied = self.newest_at_score(boundary, wanted, fallback).await?;
                (above, tied)
            }
            None => (window, Vec::new()),
        };

        let members: Vec<String> = above.iter().map(|(m, _)| m.clone()).collect();
        let seqs = self
            .store
            .zmscore(&keys.public_rooms_registered(), &members)
            .await?;
        let mut ranked: Vec<(String, f64, f64)> = above
            .into_iter()
            .zip(seqs)
            .map(|((member, score), seq)| (member, score, seq.unwrap_or(0.0)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| b.2.total_cmp(&a.2))
        });
        // Every tied room scores below every room above the boundary.
        ranked.extend(tied);

        Ok(ranked
            .into_iter()
            .filter_map(|(member, score, _)| match RoomId::parse(&member) {
                Ok(room_id) => Some((room_id, clamp_score(score))),
                Err(_) => {
                    tracing::warn!(member, "skipping malformed public room entry");
                    None
                }
            })
            .take(limit)
            .collect())
    }

    /// The `wanted` most recently registered rooms whose population is
    /// exactly `score`, newest first, as `(member, score, seq)`.
    ///
    /// Walks the registration order in batches and stops as soon as
    /// enough rooms are found. `fallback` (rooms known to hold `score`)
    /// fills any shortfall left by entries missing a registration.
    async fn newest_at_score(
        &self,
        score: f64,
        wanted: usize,
        fallback: Vec<String>,
    ) -> Result<Vec<(String, f64, f64)>, StoreError> {
        let keys = self.store.keys();
        let registered = keys.public_rooms_registered();
        let ranking = keys.public_rooms();
        let page = TIE_SCAN_BATCH.max(wanted) as isize;

        let mut found: Vec<(String, f64, f64)> = Vec::with_capacity(wanted);
        let mut start: isize = 0;
        while found.len() < wanted {
            let batch = self
                .store
                .zrevrange_withscores(&registered, start, start + page - 1)
                .await?;
            if batch.is_empty() {
                break;
            }
            let members: Vec<String> = batch.iter().map(|(m, _)| m.clone()).collect();
            let scores = self.store.zmscore(&ranking, &members).await?;
            found.extend(
                batch
                    .into_iter()
                    .zip(scores)
                    .filter(|(_, current)| *current == Some(score))
                    .map(|((member, seq), _)| (member, score, seq))
                    .take(wanted - found.len()),
            );
            start += page;
        }

        for member in fallback {
            if found.len() >= wanted {
                break;
            }
            if !found.iter().any(|(m, _, _)| *m == member) {
                found.push((member, score, 0.0));
            }
        }
        Ok(found)
    }
}

/// Registrations examined per round trip when breaking ties.
const TIE_SCAN_BATCH: usize = 64;

fn clamp_score(score: f64) -> u64 {
    score.max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use watchparty_store::{MemoryStore, StoreConfig};

    use super::*;

    fn index() -> (MemoryStore, PublicRoomIndex<MemoryStore>) {
        let store = MemoryStore::new();
        let adapter = StoreAdapter::new(store.clone(), StoreConfig::default());
        (store, PublicRoomIndex::new(adapter))
    }

    fn room(raw: &str) -> RoomId {
        RoomId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_increment() {
        let (_, index) = index();
        let r = room("aaaaaaaaaaaa");
        index.register(&r, 1).await.unwrap();
        assert_eq!(index.increment(&r, 1).await.unwrap(), Some(2));
        assert_eq!(index.increment(&r, -1).await.unwrap(), Some(1));
        assert_eq!(index.score(&r).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_increment_of_unindexed_room_writes_nothing() {
        let (store, index) = index();
        let r = room("aaaaaaaaaaaa");
        assert_eq!(index.increment(&r, 1).await.unwrap(), None);
        assert_eq!(index.score(&r).await.unwrap(), None);
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_negative_score_is_clamped_to_zero() {
        let (_, index) = index();
        let r = room("aaaaaaaaaaaa");
        index.register(&r, 1).await.unwrap();
        assert_eq!(index.increment(&r, -3).await.unwrap(), Some(0));
        assert_eq!(index.score(&r).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_remove_clears_both_sorted_sets() {
        let (store, index) = index();
        let r = room("aaaaaaaaaaaa");
        index.register(&r, 1).await.unwrap();
        assert!(index.remove(&r).await.unwrap());
        assert!(!index.remove(&r).await.unwrap());
        // Only the registration counter survives.
        assert_eq!(store.keys().await, vec!["watch-party:public_rooms_seq"]);
    }

    #[tokio::test]
    async fn test_top_rooms_ordered_by_population() {
        let (_, index) = index();
        index.register(&room("aaaaaaaaaaaa"), 1).await.unwrap();
        index.register(&room("bbbbbbbbbbbb"), 5).await.unwrap();
        index.register(&room("cccccccccccc"), 3).await.unwrap();

        let top = index.top_public_rooms(2).await.unwrap();
        assert_eq!(
            top,
            vec![(room("bbbbbbbbbbbb"), 5), (room("cccccccccccc"), 3)]
        );
    }

    #[tokio::test]
    async fn test_ties_break_by_registration_recency() {
        let (_, index) = index();
        // Registered in reverse name order, so the store's own tie order
        // (by name, descending) is the opposite of recency.
        index.register(&room("cccccccccccc"), 1).await.unwrap();
        index.register(&room("bbbbbbbbbbbb"), 1).await.unwrap();
        index.register(&room("aaaaaaaaaaaa"), 1).await.unwrap();
        index.register(&room("dddddddddddd"), 2).await.unwrap();

        let top = index.top_public_rooms(3).await.unwrap();
        assert_eq!(
            top,
            vec![
                (room("dddddddddddd"), 2),
                (room("aaaaaaaaaaaa"), 1),
                (room("bbbbbbbbbbbb"), 1),
            ]
        );

        // The store's two-element window holds "cccc…" at the boundary;
        // the newer "aaaa…" must win the tie.
        let first = index.top_public_rooms(2).await.unwrap();
        assert_eq!(
            first,
            vec![(room("dddddddddddd"), 2), (room("aaaaaaaaaaaa"), 1)]
        );
    }

    #[tokio::test]
    async fn test_listing_cost_does_not_grow_with_tied_rooms() {
        let (store, index) = index();
        for n in 0..500 {
            index.register(&room(&format!("room{n:08}")), 1).await.unwrap();
        }
        index.register(&room("popular00000"), 3).await.unwrap();

        let before = store.call_count().await;
        let top = index.top_public_rooms(2).await.unwrap();
        let calls = store.call_count().await - before;

        assert_eq!(
            top,
            vec![(room("popular00000"), 3), (room("room00000499"), 1)]
        );
        assert!(calls <= 5, "listing took {calls} store calls");
    }

    #[tokio::test]
    async fn test_clamp_does_not_resurrect_a_removed_room() {
        let (store, index) = index();
        let r = room("aaaaaaaaaaaa");
        index.register(&r, 0).await.unwrap();
        index.remove(&r).await.unwrap();
        // The clamp's write alone, as it would land after a concurrent
        // destroy removed the entry.
        let adapter = StoreAdapter::new(store.clone(), StoreConfig::default());
        adapter
            .zadd_existing(&adapter.keys().public_rooms(), r.as_str(), 0.0)
            .await
            .unwrap();
        assert_eq!(index.score(&r).await.unwrap(), None);
        assert!(index.top_public_rooms(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_top_rooms_with_zero_limit_is_empty() {
        let (_, index) = index();
        index.register(&room("aaaaaaaaaaaa"), 1).await.unwrap();
        assert!(index.top_public_rooms(0).await.unwrap().is_empty());
    }
}
