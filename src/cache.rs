//! Manifest and poster cache coordination.
//!
//! Manifests are cached for the backend's signed URL lifetime minus a
//! safety margin, so a cached manifest always expires before the signed
//! URLs inside it. Poster ETags are cached for a fixed long TTL.
//!
//! Concurrent misses for the same key may both regenerate and overwrite
//! each other; regeneration is idempotent so last write wins.

use crate::error::{Result, SigilError};
use crate::hls::MANIFEST_EXTENSION;
use crate::metrics;
use crate::store::{CacheStore, EntryMetadata};
use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether a response was served from cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A manifest body with its absolute cache expiration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedManifest {
    pub body: String,
    /// Unix seconds
    pub expiration: i64,
    pub status: CacheStatus,
}

/// Cache key for a manifest, unique per (endpoint, bucket, key).
///
/// The endpoint is folded into a fixed-length digest; bucket names cannot
/// contain `/`, so the remaining `bucket/key` split is unambiguous.
pub fn manifest_key(endpoint: &str, bucket: &str, key: &str) -> String {
    scoped_key("manifest", endpoint, bucket, key)
}

/// Cache key for a poster's ETag.
pub fn poster_key(endpoint: &str, bucket: &str, key: &str) -> String {
    scoped_key("etag", endpoint, bucket, key)
}

fn scoped_key(kind: &str, endpoint: &str, bucket: &str, key: &str) -> String {
    let digest = Sha256::digest(endpoint.as_bytes());
    format!("{kind}:{}:{bucket}/{key}", &hex::encode(digest)[..16])
}

/// Only `.m3u8` objects go through the manifest path.
pub fn validate_manifest_key(key: &str) -> Result<()> {
    if key.to_ascii_lowercase().ends_with(MANIFEST_EXTENSION) {
        Ok(())
    } else {
        Err(SigilError::InvalidRequest(format!("not a manifest: {key}")))
    }
}

/// Seconds left until `expiration`, never negative.
pub fn max_age(expiration: i64, now: DateTime<Utc>) -> u64 {
    (expiration - now.timestamp()).max(0) as u64
}

#[derive(Clone)]
pub struct CacheCoordinator {
    store: Arc<dyn CacheStore>,
    ttl_margin_secs: u64,
    default_expiration_secs: u64,
    poster_ttl: Duration,
}

impl CacheCoordinator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        ttl_margin_secs: u64,
        default_expiration_secs: u64,
        poster_ttl: Duration,
    ) -> Self {
        Self {
            store,
            ttl_margin_secs,
            default_expiration_secs,
            poster_ttl,
        }
    }

    pub fn poster_ttl(&self) -> Duration {
        self.poster_ttl
    }

    /// Manifest TTL: the backend's declared expiration (or the default)
    /// minus the margin. Zero means "do not cache".
    pub fn manifest_ttl_secs(&self, declared_expiration: Option<u64>) -> u64 {
        declared_expiration
            .unwrap_or(self.default_expiration_secs)
            .saturating_sub(self.ttl_margin_secs)
    }

    /// Serve `key` from cache, or run `generate` and cache its output.
    ///
    /// `generate` receives the absolute expiration the new entry will carry.
    /// Store failures degrade to a miss (read) or an uncached response
    /// (write); generation failures propagate and nothing is cached.
    pub async fn get_or_generate<F, Fut>(
        &self,
        key: &str,
        ttl_secs: u64,
        now: DateTime<Utc>,
        generate: F,
    ) -> Result<CachedManifest>
    where
        F: FnOnce(DateTime<Utc>) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        match self.store.get_with_metadata(key).await {
            Ok(Some(entry)) => {
                debug!("Manifest cache HIT for {}", key);
                metrics::record_cache_lookup("manifest", true);
                return Ok(CachedManifest {
                    body: entry.value,
                    expiration: entry.metadata.expiration,
                    status: CacheStatus::Hit,
                });
            }
            Ok(None) => debug!("Manifest cache MISS for {}", key),
            Err(e) => warn!("Manifest cache read failed for {}: {}", key, e),
        }
        metrics::record_cache_lookup("manifest", false);

        let expires_at = i64::try_from(ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                SigilError::ConfigurationError(format!("manifest TTL {ttl_secs}s is out of range"))
            })?;
        let body = generate(expires_at).await?;
        let expiration = expires_at.timestamp();

        if ttl_secs > 0 {
            if let Err(e) = self
                .store
                .put(
                    key,
                    body.clone(),
                    EntryMetadata { expiration },
                    Duration::from_secs(ttl_secs),
                )
                .await
            {
                warn!("Manifest cache write failed for {}: {}", key, e);
            }
        } else {
            warn!("Signed URL lifetime does not exceed the TTL margin; not caching {}", key);
        }

        Ok(CachedManifest {
            body,
            expiration,
            status: CacheStatus::Miss,
        })
    }

    /// Drop a single entry.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        info!("Invalidating cache entry {}", key);
        self.store.delete(key).await
    }

    /// Delete every key in the store, page by page. Returns the count deleted.
    pub async fn flush(&self) -> Result<usize> {
        let mut cursor = None;
        let mut deleted = 0;

        loop {
            let page = self.store.list(cursor).await?;
            for key in &page.keys {
                self.store.delete(key).await?;
            }
            deleted += page.keys.len();

            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!("Flushed {} cache entries", deleted);
        metrics::record_flushed_keys(deleted);
        Ok(deleted)
    }

    /// Stored ETag for a poster, if any. Read failures count as a miss.
    pub async fn lookup_etag(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(found) => {
                metrics::record_cache_lookup("poster", found.is_some());
                found
            }
            Err(e) => {
                warn!("ETag cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Cache a poster's ETag for the poster TTL. An out-of-range TTL or a
    /// store failure leaves the ETag uncached.
    pub async fn store_etag(&self, key: &str, etag: &str, now: DateTime<Utc>) {
        let Some(expiration) = i64::try_from(self.poster_ttl.as_secs())
            .ok()
            .and_then(|ttl| now.timestamp().checked_add(ttl))
        else {
            warn!("Poster TTL {:?} is out of range; not caching {}", self.poster_ttl, key);
            return;
        };
        if let Err(e) = self
            .store
            .put(
                key,
                etag.to_string(),
                EntryMetadata { expiration },
                self.poster_ttl,
            )
            .await
        {
            warn!("ETag cache write failed for {}: {}", key, e);
        }
    }
}
