//! Shared store adapter for the watch party relay.
//!
//! Room membership, room metadata, and the public room ranking all live
//! in a shared key-value store so they survive a relay restart. This
//! crate is the only place that talks to that store. It has no business
//! logic: it offers the primitive set / sorted-set / hash / key
//! operations the room layer needs, behind a [`Store`] trait.
//!
//! # Key types
//!
//! - [`Store`] — the primitive operations a backend must support
//! - [`MemoryStore`] — in-process backend for tests and local development
//! - [`RedisStore`] — Redis backend (feature `redis`, on by default)
//! - [`StoreAdapter`] — namespaced keys, per-call timeouts, and bounded
//!   retry of idempotent calls on top of any [`Store`]
//! - [`StoreConfig`] — namespace, timeout, and retry settings

mod adapter;
mod config;
mod error;
mod keys;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;

use std::future::Future;

pub use adapter::StoreAdapter;
pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::StoreError;
pub use keys::KeySpace;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// The primitive operations the shared store must support.
///
/// Method names follow the Redis commands they map onto, so a reader who
/// knows Redis knows the semantics. In particular:
///
/// - removing the last member of a set or sorted set deletes the key,
/// - reading a missing key yields an empty value, never an error,
/// - using a key as the wrong kind of structure is
///   [`StoreError::UnexpectedType`].
///
/// Every method returns a `Send` future because connection handlers run
/// on Tokio's multi-threaded scheduler.
pub trait Store: Clone + Send + Sync + 'static {
    /// Adds `member` to a set. Returns `true` if it was not already there.
    fn sadd(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Removes `member` from a set. Returns `true` if it was present.
    fn srem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Number of members in a set (0 for a missing key).
    fn scard(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// All members of a set, in no particular order.
    fn smembers(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Whether `key` holds any value.
    fn exists(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Deletes every listed key. Returns how many existed.
    fn del(
        &self,
        keys: &[String],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Sets several hash fields at once.
    fn hset_multiple(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reads several hash fields at once, `None` for each missing field.
    fn hmget(
        &self,
        key: &str,
        fields: &[String],
    ) -> impl Future<Output = Result<Vec<Option<String>>, StoreError>> + Send;

    /// Adds or overwrites `member` with `score`.
    fn zadd(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites the score of an existing member (`ZADD XX`). An absent
    /// member stays absent.
    fn zadd_existing(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Adds `delta` to the score of an existing member (`ZADD XX INCR`).
    ///
    /// Returns the new score, or `None` if the member is absent, in
    /// which case nothing is written.
    fn zadd_incr_existing(
        &self,
        key: &str,
        member: &str,
        delta: f64,
    ) -> impl Future<Output = Result<Option<f64>, StoreError>> + Send;

    /// Removes `member`. Returns `true` if it was present.
    fn zrem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Members ranked from highest to lowest score, positions
    /// `start..=stop` inclusive (negative indexes count from the end).
    fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> impl Future<Output = Result<Vec<(String, f64)>, StoreError>> + Send;

    /// Scores of several members in one call (`ZMSCORE`), `None` for
    /// each absent member.
    fn zmscore(
        &self,
        key: &str,
        members: &[String],
    ) -> impl Future<Output = Result<Vec<Option<f64>>, StoreError>> + Send;

    /// Score of `member`, if present.
    fn zscore(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<Option<f64>, StoreError>> + Send;

    /// Atomically increments an integer counter and returns the new value.
    fn incr(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;
}
