//! Process-local cache store.
//!
//! Entries expire lazily: a read past the deadline drops the entry and
//! reports a miss, and enumeration skips anything stale.

use super::{CacheEntry, CacheStore, EntryMetadata, KeyPage};
use crate::error::{Result, SigilError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Clone, Debug)]
struct StoredEntry {
    entry: CacheEntry,
    expires_at: Instant,
}

/// Thread-safe in-memory store with per-entry TTL.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredEntry>>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit how many keys one [`CacheStore::list`] call returns.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        if let Some(stored) = self.entries.get(key) {
            if stored.expires_at > Instant::now() {
                return Some(stored.entry.clone());
            }
            // Stale: drop the read guard before removing
            drop(stored);
            self.entries.remove(key);
            debug!("Evicted expired cache entry {}", key);
        }
        None
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live_entry(key).map(|entry| entry.value))
    }

    async fn get_with_metadata(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.live_entry(key))
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        metadata: EntryMetadata,
        ttl: Duration,
    ) -> Result<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| SigilError::CacheError(format!("TTL {ttl:?} is out of range")))?;
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                entry: CacheEntry { value, metadata },
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    /// Keys are returned in sorted order; the cursor is the last key handed out.
    async fn list(&self, cursor: Option<String>) -> Result<KeyPage> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|item| item.expires_at > now)
            .map(|item| item.key().clone())
            .filter(|key| cursor.as_ref().is_none_or(|after| key > after))
            .collect();
        keys.sort();

        let cursor = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };

        Ok(KeyPage { keys, cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> EntryMetadata {
        EntryMetadata {
            expiration: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn hit_within_ttl() {
        let store = MemoryStore::new();
        store
            .put("k", "body".to_string(), meta(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some("body".to_string()));
        let entry = store.get_with_metadata("k").await.unwrap().unwrap();
        assert_eq!(entry.metadata, meta());
    }

    #[tokio::test]
    async fn miss_for_unknown_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn miss_after_ttl() {
        let store = MemoryStore::new();
        store
            .put("k", "body".to_string(), meta(), Duration::from_millis(1))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.get("k").await.unwrap(), None, "Entry should be stale after TTL");
        assert!(store.entries.is_empty(), "Stale entry should be evicted on read");
    }

    #[tokio::test]
    async fn unrepresentable_ttl_is_an_error() {
        let store = MemoryStore::new();
        let result = store
            .put("k", "body".to_string(), meta(), Duration::from_secs(u64::MAX))
            .await;

        assert!(matches!(result, Err(SigilError::CacheError(_))));
        assert!(store.entries.is_empty());
    }

    #[tokio::test]
    async fn overwrite_replaces_entry() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.put("k", "old".to_string(), meta(), ttl).await.unwrap();
        store.put("k", "new".to_string(), meta(), ttl).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = MemoryStore::new();
        store
            .put("k", "body".to_string(), meta(), Duration::from_secs(60))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_paginates_with_cursor() {
        let store = MemoryStore::new().with_page_size(2);
        for key in ["c", "a", "e", "b", "d"] {
            store
                .put(key, String::new(), meta(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        let first = store.list(None).await.unwrap();
        assert_eq!(first.keys, vec!["a", "b"]);
        assert_eq!(first.cursor.as_deref(), Some("b"));

        let second = store.list(first.cursor).await.unwrap();
        assert_eq!(second.keys, vec!["c", "d"]);

        let third = store.list(second.cursor).await.unwrap();
        assert_eq!(third.keys, vec!["e"]);
        assert_eq!(third.cursor, None);
    }

    #[tokio::test]
    async fn list_skips_expired_entries() {
        let store = MemoryStore::new();
        store
            .put("old", String::new(), meta(), Duration::from_millis(1))
            .await
            .unwrap();
        store
            .put("fresh", String::new(), meta(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.list(None).await.unwrap().keys, vec!["fresh"]);
    }
}
