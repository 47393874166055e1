//! In-memory cache implementation using moka
//!
//! Each entry carries its own time-to-live, capped by the cache-wide
//! maximum. Values are stored as JSON so any serializable type fits.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default upper bound on entry lifetime (1 hour)
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            ttl,
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// Expires every entry after the TTL it was stored with
struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache using moka
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    max_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("max_ttl", &self.max_ttl)
            .finish()
    }
}

impl MemoryCache {
    /// Create a memory cache holding up to 10,000 entries for at most an hour
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a memory cache with custom capacity and maximum entry lifetime
    pub fn with_capacity_and_ttl(max_capacity: u64, max_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache, max_ttl }
    }

    /// Get the maximum lifetime of an entry
    pub fn max_ttl(&self) -> Duration {
        self.max_ttl
    }

    /// Get the current number of entries in the cache
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Glob-style match: `*` is any run of characters, `?` exactly one
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern_chars: Vec<char> = pattern.chars().collect();
        let key_chars: Vec<char> = key.chars().collect();
        Self::glob_match(&pattern_chars, &key_chars, 0, 0)
    }

    fn glob_match(pattern: &[char], key: &[char], pi: usize, ki: usize) -> bool {
        if pi == pattern.len() {
            return ki == key.len();
        }

        match pattern[pi] {
            '*' => {
                Self::glob_match(pattern, key, pi + 1, ki)
                    || (ki < key.len() && Self::glob_match(pattern, key, pi, ki + 1))
            }
            '?' => ki < key.len() && Self::glob_match(pattern, key, pi + 1, ki + 1),
            c => ki < key.len() && key[ki] == c && Self::glob_match(pattern, key, pi + 1, ki + 1),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl.min(self.max_ttl))?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let keys_to_delete: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys_to_delete {
            self.cache.invalidate(&key).await;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();

        cache.set("key1", &"value1".to_string(), Duration::from_secs(60)).await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = MemoryCache::new();

        let result: Option<String> = cache.get("nonexistent").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_own_ttl() {
        let cache = MemoryCache::new();

        cache.set("short", &"a".to_string(), Duration::from_millis(20)).await.unwrap();
        cache.set("long", &"b".to_string(), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.cache.run_pending_tasks().await;

        let short: Option<String> = cache.get("short").await.unwrap();
        let long: Option<String> = cache.get("long").await.unwrap();
        assert_eq!(short, None);
        assert_eq!(long, Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_ttl_is_capped_by_max() {
        let cache = MemoryCache::with_capacity_and_ttl(100, Duration::from_millis(20));

        cache.set("key", &1u8, Duration::from_secs(3600)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.cache.run_pending_tasks().await;

        let result: Option<u8> = cache.get("key").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_overwrite_resets_value() {
        let cache = MemoryCache::new();

        cache.set("page", &"old".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set("page", &"new".to_string(), Duration::from_secs(60)).await.unwrap();

        let result: Option<String> = cache.get("page").await.unwrap();
        assert_eq!(result, Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new();

        cache.set("key1", &"value1".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.delete("key1").await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_delete_pattern_star() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);

        cache.set("index:anon:1", &"a".to_string(), ttl).await.unwrap();
        cache.set("index:user:7:1", &"b".to_string(), ttl).await.unwrap();
        cache.set("other:1", &"c".to_string(), ttl).await.unwrap();

        cache.delete_pattern("index:*").await.unwrap();

        let anon: Option<String> = cache.get("index:anon:1").await.unwrap();
        let user: Option<String> = cache.get("index:user:7:1").await.unwrap();
        let other: Option<String> = cache.get("other:1").await.unwrap();
        assert_eq!(anon, None);
        assert_eq!(user, None);
        assert_eq!(other, Some("c".to_string()));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();

        cache.set("k1", &1i32, Duration::from_secs(60)).await.unwrap();
        cache.set("k2", &2i32, Duration::from_secs(60)).await.unwrap();
        cache.clear().await.unwrap();

        assert_eq!(cache.get::<i32>("k1").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("k2").await.unwrap(), None);
    }

    #[test]
    fn test_pattern_matching() {
        assert!(MemoryCache::pattern_matches("index:*", "index:anon:1"));
        assert!(MemoryCache::pattern_matches("index:?:1", "index:a:1"));
        assert!(!MemoryCache::pattern_matches("index:?:1", "index:ab:1"));
        assert!(MemoryCache::pattern_matches("*", ""));
        assert!(!MemoryCache::pattern_matches("index", "index:1"));
    }

    proptest! {
        #[test]
        fn prop_literal_pattern_matches_only_itself(key in "[a-z0-9:]{0,20}", other in "[a-z0-9:]{0,20}") {
            prop_assert!(MemoryCache::pattern_matches(&key, &key));
            prop_assert_eq!(MemoryCache::pattern_matches(&key, &other), key == other);
        }

        #[test]
        fn prop_prefix_star_matches_extensions(prefix in "[a-z:]{0,10}", suffix in "[a-z0-9:]{0,10}") {
            let pattern = format!("{}*", prefix);
            let key = format!("{}{}", prefix, suffix);
            prop_assert!(MemoryCache::pattern_matches(&pattern, &key));
        }
    }
}
