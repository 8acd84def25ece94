//! Redis [`Store`] backend.
//!
//! Uses a [`ConnectionManager`], which multiplexes commands over one
//! connection and reconnects transparently after a drop. Cloning a
//! `RedisStore` clones the manager handle, not the connection.

use redis::aio::ConnectionManager;
use redis::{Client, ErrorKind, RedisError};

use crate::{Store, StoreError};

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.kind() == ErrorKind::TypeError || err.code() == Some("WRONGTYPE")
        {
            StoreError::UnexpectedType(err.to_string())
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}

/// A [`Store`] backed by a Redis server (or cluster proxy).
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379`) and verifies the
    /// connection with a `PING`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!(url, "connected to redis");
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

impl Store for RedisStore {
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let added: i64 = redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn())
            .await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let removed: i64 = redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn())
            .await?;
        Ok(removed > 0)
    }

    async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        let count: u64 = redis::cmd("SCARD")
            .arg(key)
            .query_async(&mut self.conn())
            .await?;
        Ok(count)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut self.conn())
            .await?;
        Ok(members)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut self.conn())
            .await?;
        Ok(count > 0)
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let deleted: u64 = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut self.conn())
            .await?;
        Ok(deleted)
    }

    async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        let _: i64 = cmd.query_async(&mut self.conn()).await?;
        Ok(())
    }

    async fn hmget(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, StoreError> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(key)
            .arg(fields)
            .query_async(&mut self.conn())
            .await?;
        Ok(values)
    }

    async fn zadd(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<(), StoreError> {
        let _: i64 = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut self.conn())
            .await?;
        Ok(())
    }

    async fn zadd_existing(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<(), StoreError> {
        let _: i64 = redis::cmd("ZADD")
            .arg(key)
            .arg("XX")
            .arg(score)
            .arg(member)
            .query_async(&mut self.conn())
            .await?;
        Ok(())
    }

    async fn zadd_incr_existing(
        &self,
        key: &str,
        member: &str,
        delta: f64,
    ) -> Result<Option<f64>, StoreError> {
        let score: Option<f64> = redis::cmd("ZADD")
            .arg(key)
            .arg("XX")
            .arg("INCR")
            .arg(delta)
            .arg(member)
            .query_async(&mut self.conn())
            .await?;
        Ok(score)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let removed: i64 = redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn())
            .await?;
        Ok(removed > 0)
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let ranked: Vec<(String, f64)> = redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut self.conn())
            .await?;
        Ok(ranked)
    }

    async fn zmscore(
        &self,
        key: &str,
        members: &[String],
    ) -> Result<Vec<Option<f64>>, StoreError> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let scores: Vec<Option<f64>> = redis::cmd("ZMSCORE")
            .arg(key)
            .arg(members)
            .query_async(&mut self.conn())
            .await?;
        Ok(scores)
    }

    async fn zscore(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<f64>, StoreError> {
        let score: Option<f64> = redis::cmd("ZSCORE")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn())
            .await?;
        Ok(score)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let value: i64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut self.conn())
            .await?;
        Ok(value)
    }
}
