//! Valkey/Redis-backed cache store shared between proxy instances.

use super::{CacheEntry, CacheStore, EntryMetadata, KeyPage};
use crate::error::{Result, SigilError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{info, warn};

const KEY_PREFIX: &str = "sigil:";
const SCAN_COUNT: usize = 1000;

#[derive(Clone)]
pub struct ValkeyStore {
    conn: ConnectionManager,
}

impl ValkeyStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(store_error)?;
        let conn = ConnectionManager::new(client).await.map_err(store_error)?;
        info!("Connected to Valkey cache store");
        Ok(Self { conn })
    }

    fn namespaced(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

fn store_error(e: redis::RedisError) -> SigilError {
    SigilError::CacheError(e.to_string())
}

#[async_trait]
impl CacheStore for ValkeyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_with_metadata(key).await?.map(|entry| entry.value))
    }

    async fn get_with_metadata(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = self.conn.clone();
        let raw = redis::cmd("GET")
            .arg(Self::namespaced(key))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(store_error)?;

        // An undecodable entry is treated as a miss and overwritten on refill.
        Ok(raw.and_then(|json| match serde_json::from_str::<CacheEntry>(&json) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }))
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        metadata: EntryMetadata,
        ttl: Duration,
    ) -> Result<()> {
        let json = serde_json::to_string(&CacheEntry { value, metadata })
            .map_err(|e| SigilError::CacheError(e.to_string()))?;

        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(Self::namespaced(key))
            .arg(json)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(store_error)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(Self::namespaced(key))
            .query_async::<i64>(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn list(&self, cursor: Option<String>) -> Result<KeyPage> {
        let mut conn = self.conn.clone();
        let (next, keys) = redis::cmd("SCAN")
            .arg(cursor.as_deref().unwrap_or("0"))
            .arg("MATCH")
            .arg(format!("{KEY_PREFIX}*"))
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async::<(String, Vec<String>)>(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(KeyPage {
            keys: keys
                .into_iter()
                .filter_map(|k| k.strip_prefix(KEY_PREFIX).map(str::to_string))
                .collect(),
            cursor: (next != "0").then_some(next),
        })
    }
}
