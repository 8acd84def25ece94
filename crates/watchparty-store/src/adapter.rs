//! Typed façade over a [`Store`]: namespaced keys, timeouts, retries.
//!
//! Every call is bounded by [`StoreConfig::command_timeout`]. Calls that
//! are safe to repeat (set add/remove, hash writes of fixed values, plain
//! reads, deletes) are retried up to [`StoreConfig::max_retries`] times
//! after a transient failure. Calls that are NOT safe to repeat
//! (`zadd_incr_existing`, `incr`) are attempted exactly once: a timed-out
//! increment may still have landed, and repeating it would double-count.

use std::future::Future;

use crate::{KeySpace, Store, StoreConfig, StoreError};

/// A [`Store`] plus the key layout and failure policy of the relay.
///
/// Cheap to clone when the underlying store is; each room-layer
/// component holds its own clone.
#[derive(Debug, Clone)]
pub struct StoreAdapter<S: Store> {
    store: S,
    keys: KeySpace,
    config: StoreConfig,
}

impl<S: Store> StoreAdapter<S> {
    pub fn new(store: S, config: StoreConfig) -> Self {
        Self {
            keys: KeySpace::new(config.namespace.clone()),
            store,
            config,
        }
    }

    /// The key layout under the configured namespace.
    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The raw backend, bypassing timeouts and retries.
    pub fn backend(&self) -> &S {
        &self.store
    }

    // -- sets --

    pub async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let store = &self.store;
        self.retrying("SADD", move || store.sadd(key, member)).await
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let store = &self.store;
        self.retrying("SREM", move || store.srem(key, member)).await
    }

    pub async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        let store = &self.store;
        self.retrying("SCARD", move || store.scard(key)).await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let store = &self.store;
        self.retrying("SMEMBERS", move || store.smembers(key)).await
    }

    // -- keys --

    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let store = &self.store;
        self.retrying("EXISTS", move || store.exists(key)).await
    }

    pub async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        let store = &self.store;
        self.retrying("DEL", move || store.del(keys)).await
    }

    // -- hashes --

    pub async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), StoreError> {
        let store = &self.store;
        self.retrying("HSET", move || store.hset_multiple(key, fields))
            .await
    }

    pub async fn hmget(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, StoreError> {
        let store = &self.store;
        self.retrying("HMGET", move || store.hmget(key, fields)).await
    }

    // -- sorted sets --

    pub async fn zadd(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<(), StoreError> {
        let store = &self.store;
        self.retrying("ZADD", move || store.zadd(key, member, score))
            .await
    }

    pub async fn zadd_existing(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<(), StoreError> {
        let store = &self.store;
        self.retrying("ZADD XX", move || store.zadd_existing(key, member, score))
            .await
    }

    /// Not retried: see the module docs.
    pub async fn zadd_incr_existing(
        &self,
        key: &str,
        member: &str,
        delta: f64,
    ) -> Result<Option<f64>, StoreError> {
        self.once("ZADD XX INCR", self.store.zadd_incr_existing(key, member, delta))
            .await
    }

    pub async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let store = &self.store;
        self.retrying("ZREM", move || store.zrem(key, member)).await
    }

    pub async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let store = &self.store;
        self.retrying("ZREVRANGE", move || {
            store.zrevrange_withscores(key, start, stop)
        })
        .await
    }

    pub async fn zmscore(
        &self,
        key: &str,
        members: &[String],
    ) -> Result<Vec<Option<f64>>, StoreError> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let store = &self.store;
        self.retrying("ZMSCORE", move || store.zmscore(key, members))
            .await
    }

    pub async fn zscore(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<f64>, StoreError> {
        let store = &self.store;
        self.retrying("ZSCORE", move || store.zscore(key, member)).await
    }

    // -- counters --

    /// Not retried: see the module docs.
    pub async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.once("INCR", self.store.incr(key)).await
    }

    // -- failure policy --

    async fn timed<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.config.command_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }

    async fn once<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        self.timed(call).await.inspect_err(|e| {
            tracing::warn!(op, error = %e, "store call failed");
        })
    }

    async fn retrying<T, F, Fut>(
        &self,
        op: &'static str,
        call: F,
    ) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match self.timed(call()).await {
                Ok(value) => return Ok(value),
                Err(e)
                    if e.is_transient() && attempt < self.config.max_retries =>
                {
                    attempt += 1;
                    tracing::debug!(op, attempt, error = %e, "retrying store call");
                    tokio::time::sleep(self.config.retry_backoff * attempt)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(op, attempts = attempt + 1, error = %e, "store call failed");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::MemoryStore;

    fn adapter(store: &MemoryStore, retries: u32) -> StoreAdapter<MemoryStore> {
        StoreAdapter::new(
            store.clone(),
            StoreConfig::builder()
                .namespace("test")
                .max_retries(retries)
                .command_timeout(Duration::from_millis(100))
                .retry_backoff(Duration::from_millis(1))
                .build(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_idempotent_call_retries_through_transient_failures() {
        let store = MemoryStore::new();
        let adapter = adapter(&store, 3);
        store.fail_next(2).await;

        assert!(adapter.sadd("s", "a").await.unwrap());
        assert_eq!(store.call_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let store = MemoryStore::new();
        let adapter = adapter(&store, 2);
        store.fail_next(10).await;

        let err = adapter.scard("s").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.call_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_is_never_retried() {
        let store = MemoryStore::new();
        let adapter = adapter(&store, 3);
        store.zadd("z", "m", 1.0).await.unwrap();
        store.fail_next(1).await;

        assert!(adapter.zadd_incr_existing("z", "m", 1.0).await.is_err());
        assert_eq!(store.zscore("z", "m").await.unwrap(), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let store = MemoryStore::new();
        let adapter = adapter(&store, 0);
        store.set_latency(Duration::from_secs(5)).await;

        let err = adapter.exists("k").await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_keys_use_configured_namespace() {
        let store = MemoryStore::new();
        let adapter = adapter(&store, 0);
        assert_eq!(adapter.keys().public_rooms(), "test:public_rooms");
    }
}
