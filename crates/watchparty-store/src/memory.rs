//! In-process [`Store`] backend.
//!
//! Behaves like a single Redis instance for the commands the relay uses,
//! including deleting a set once its last member is removed. Used by the
//! test suites and by `watchparty --memory` for local development.
//!
//! Fault injection ([`MemoryStore::fail_next`], [`MemoryStore::set_latency`])
//! lets tests exercise the adapter's timeout and retry paths.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::{Store, StoreError};

#[derive(Debug, Clone)]
enum Value {
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
    SortedSet(HashMap<String, f64>),
    Counter(i64),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Set(_) => "set",
            Self::Hash(_) => "hash",
            Self::SortedSet(_) => "zset",
            Self::Counter(_) => "string",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    data: HashMap<String, Value>,
    failures_pending: usize,
    successes_before_failure: usize,
    /// Injected failures still apply the call and only lose the reply.
    failures_apply: bool,
    latency: Duration,
    calls: u64,
}

/// A [`Store`] held entirely in memory.
///
/// Cheap to clone; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn wrong_type(key: &str, found: &Value, wanted: &str) -> StoreError {
    StoreError::UnexpectedType(format!(
        "WRONGTYPE key {key} holds a {} where a {wanted} was expected",
        found.kind()
    ))
}

/// Highest score first; equal scores by member, descending (Redis order).
fn rank_desc(a: &(String, f64), b: &(String, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.0.cmp(&a.0))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` store calls fail with
    /// [`StoreError::Unavailable`].
    pub async fn fail_next(&self, count: usize) {
        self.fail_after(0, count).await;
    }

    /// Lets the next `skip` calls succeed, then fails `count` calls.
    /// Useful for breaking a multi-step sequence at a chosen step.
    pub async fn fail_after(&self, skip: usize, count: usize) {
        self.inject(skip, count, false).await;
    }

    /// Lets the next `skip` calls succeed, then applies `count` calls
    /// but reports them as failed, like a reply lost on the wire.
    pub async fn lose_replies_after(&self, skip: usize, count: usize) {
        self.inject(skip, count, true).await;
    }

    async fn inject(&self, skip: usize, count: usize, apply: bool) {
        let mut inner = self.inner.lock().await;
        inner.successes_before_failure = skip;
        inner.failures_pending = count;
        inner.failures_apply = apply;
    }

    /// Delays every subsequent store call by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.inner.lock().await.latency = latency;
    }

    /// Total number of calls received, including failed ones.
    pub async fn call_count(&self) -> u64 {
        self.inner.lock().await.calls
    }

    /// Every key currently holding a value, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> =
            self.inner.lock().await.data.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Runs `f` against the data map after applying injected faults.
    async fn with_data<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Value>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let (latency, lose_reply) = {
            let mut inner = self.inner.lock().await;
            inner.calls += 1;
            let mut lose_reply = false;
            if inner.failures_pending > 0 {
                if inner.successes_before_failure > 0 {
                    inner.successes_before_failure -= 1;
                } else {
                    inner.failures_pending -= 1;
                    if !inner.failures_apply {
                        return Err(StoreError::Unavailable(
                            "injected failure".into(),
                        ));
                    }
                    lose_reply = true;
                }
            }
            (inner.latency, lose_reply)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.inner.lock().await;
        let result = f(&mut inner.data);
        if lose_reply {
            return Err(StoreError::Unavailable("injected lost reply".into()));
        }
        result
    }
}

/// Borrows the set at `key`, creating it if `create` is set.
fn set_mut<'a>(
    data: &'a mut HashMap<String, Value>,
    key: &str,
    create: bool,
) -> Result<Option<&'a mut HashSet<String>>, StoreError> {
    if create && !data.contains_key(key) {
        data.insert(key.to_owned(), Value::Set(HashSet::new()));
    }
    match data.get_mut(key) {
        None => Ok(None),
        Some(Value::Set(set)) => Ok(Some(set)),
        Some(other) => Err(wrong_type(key, other, "set")),
    }
}

fn zset_mut<'a>(
    data: &'a mut HashMap<String, Value>,
    key: &str,
    create: bool,
) -> Result<Option<&'a mut HashMap<String, f64>>, StoreError> {
    if create && !data.contains_key(key) {
        data.insert(key.to_owned(), Value::SortedSet(HashMap::new()));
    }
    match data.get_mut(key) {
        None => Ok(None),
        Some(Value::SortedSet(zset)) => Ok(Some(zset)),
        Some(other) => Err(wrong_type(key, other, "zset")),
    }
}

/// Drops `key` if it now holds an empty collection.
fn drop_if_empty(data: &mut HashMap<String, Value>, key: &str) {
    let empty = match data.get(key) {
        Some(Value::Set(set)) => set.is_empty(),
        Some(Value::SortedSet(zset)) => zset.is_empty(),
        Some(Value::Hash(hash)) => hash.is_empty(),
        _ => false,
    };
    if empty {
        data.remove(key);
    }
}

/// Resolves Redis-style inclusive, possibly negative, range bounds.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl Store for MemoryStore {
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.with_data(|data| {
            let set = set_mut(data, key, true)?;
            Ok(set.is_some_and(|s| s.insert(member.to_owned())))
        })
        .await
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.with_data(|data| {
            let removed = match set_mut(data, key, false)? {
                Some(set) => set.remove(member),
                None => false,
            };
            drop_if_empty(data, key);
            Ok(removed)
        })
        .await
    }

    async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        self.with_data(|data| {
            Ok(set_mut(data, key, false)?.map_or(0, |s| s.len() as u64))
        })
        .await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.with_data(|data| {
            Ok(set_mut(data, key, false)?
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default())
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.with_data(|data| Ok(data.contains_key(key))).await
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.with_data(|data| {
            Ok(keys.iter().filter(|k| data.remove(*k).is_some()).count()
                as u64)
        })
        .await
    }

    async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), StoreError> {
        self.with_data(|data| {
            let entry = data
                .entry(key.to_owned())
                .or_insert_with(|| Value::Hash(HashMap::new()));
            match entry {
                Value::Hash(hash) => {
                    for (field, value) in fields {
                        hash.insert(field.clone(), value.clone());
                    }
                    Ok(())
                }
                other => Err(wrong_type(key, other, "hash")),
            }
        })
        .await
    }

    async fn hmget(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, StoreError> {
        self.with_data(|data| match data.get(key) {
            None => Ok(vec![None; fields.len()]),
            Some(Value::Hash(hash)) => {
                Ok(fields.iter().map(|f| hash.get(f).cloned()).collect())
            }
            Some(other) => Err(wrong_type(key, other, "hash")),
        })
        .await
    }

    async fn zadd(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<(), StoreError> {
        self.with_data(|data| {
            if let Some(zset) = zset_mut(data, key, true)? {
                zset.insert(member.to_owned(), score);
            }
            Ok(())
        })
        .await
    }

    async fn zadd_existing(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<(), StoreError> {
        self.with_data(|data| {
            if let Some(current) =
                zset_mut(data, key, false)?.and_then(|zset| zset.get_mut(member))
            {
                *current = score;
            }
            Ok(())
        })
        .await
    }

    async fn zadd_incr_existing(
        &self,
        key: &str,
        member: &str,
        delta: f64,
    ) -> Result<Option<f64>, StoreError> {
        self.with_data(|data| {
            let score = zset_mut(data, key, false)?
                .and_then(|zset| zset.get_mut(member))
                .map(|score| {
                    *score += delta;
                    *score
                });
            Ok(score)
        })
        .await
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.with_data(|data| {
            let removed = match zset_mut(data, key, false)? {
                Some(zset) => zset.remove(member).is_some(),
                None => false,
            };
            drop_if_empty(data, key);
            Ok(removed)
        })
        .await
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        self.with_data(|data| {
            let Some(zset) = zset_mut(data, key, false)? else {
                return Ok(Vec::new());
            };
            let mut ranked: Vec<(String, f64)> =
                zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
            ranked.sort_by(rank_desc);
            Ok(match resolve_range(ranked.len(), start, stop) {
                Some((from, to)) => ranked[from..=to].to_vec(),
                None => Vec::new(),
            })
        })
        .await
    }

    async fn zmscore(
        &self,
        key: &str,
        members: &[String],
    ) -> Result<Vec<Option<f64>>, StoreError> {
        self.with_data(|data| {
            let zset = zset_mut(data, key, false)?;
            Ok(members
                .iter()
                .map(|m| zset.as_ref().and_then(|z| z.get(m).copied()))
                .collect())
        })
        .await
    }

    async fn zscore(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<f64>, StoreError> {
        self.with_data(|data| {
            Ok(zset_mut(data, key, false)?
                .and_then(|zset| zset.get(member).copied()))
        })
        .await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.with_data(|data| {
            let entry = data
                .entry(key.to_owned())
                .or_insert(Value::Counter(0));
            match entry {
                Value::Counter(n) => {
                    *n += 1;
                    Ok(*n)
                }
                other => Err(wrong_type(key, other, "counter")),
            }
        })
        .await
    }
}
