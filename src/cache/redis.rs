//! Redis cache implementation
//!
//! Every key is namespaced under `yatube:` so several applications can
//! share one Redis database. `clear` only removes keys in that namespace.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

const KEY_PREFIX: &str = "yatube:";

/// Number of keys to scan per iteration in delete_pattern
const SCAN_COUNT: usize = 100;

/// Redis cache storing values as JSON strings
pub struct RedisCache {
    connection: MultiplexedConnection,
    max_ttl: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("max_ttl", &self.max_ttl)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connect to Redis; entries never outlive `max_ttl`
    pub async fn with_ttl(redis_url: &str, max_ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { connection, max_ttl })
    }

    fn namespaced(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl CacheLayer for RedisCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection.clone();

        let result: Option<String> = conn
            .get(Self::namespaced(key))
            .await
            .context("Failed to get value from Redis")?;

        match result {
            Some(json) => {
                let value = serde_json::from_str(&json).context("Failed to deserialize cached value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();

        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;

        // SETEX takes whole seconds
        let ttl_secs = ttl.min(self.max_ttl).as_secs().max(1);

        let _: () = conn
            .set_ex(Self::namespaced(key), json, ttl_secs)
            .await
            .context("Failed to set value in Redis")?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .del(Self::namespaced(key))
            .await
            .context("Failed to delete key from Redis")?;

        Ok(())
    }

    /// Delete keys matching a glob pattern using SCAN + DEL
    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let redis_pattern = Self::namespaced(pattern);

        let mut cursor: u64 = 0;
        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&redis_pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .context("Failed to scan keys in Redis")?;

            if !keys.is_empty() {
                let _: () = conn
                    .del(&keys)
                    .await
                    .context("Failed to delete keys from Redis")?;
            }

            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.delete_pattern("*").await
    }
}
