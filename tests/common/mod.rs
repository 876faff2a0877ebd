//! Shared fixtures: an in-memory object store and state builders.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Bytes;
use sigil::backend::{BackendClient, BackendRegistry, ObjectStore};
use sigil::config::{BackendConfig, CacheStoreType, Config};
use sigil::error::{Result, SigilError};
use sigil::server::state::AppState;
use sigil::store::memory::MemoryStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const MEDIA_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:10\n\
#EXT-X-MEDIA-SEQUENCE:0\n\
#EXTINF:10.0,\n\
seg_000.ts\n\
#EXTINF:10.0,\n\
seg_001.ts\n\
#EXTINF:10.0,\n\
seg_002.ts\n\
#EXT-X-ENDLIST\n";

pub const MASTER_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\n\
720p/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=640000,RESOLUTION=640x360\n\
360p/index.m3u8\n";

pub const SECRET: &str = "test-secret";

/// Object store backed by a map; signing counts calls.
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<HashMap<(String, String), Bytes>>,
    failing_keys: Mutex<HashSet<String>>,
    pub sign_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeStore {
    pub fn put(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    pub fn fail_signing(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| SigilError::NotFound(format!("{bucket}/{key}")))
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(SigilError::SigningError(format!("denied {key}")));
        }
        let n = self.sign_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://{bucket}.storage.test/{key}?X-Amz-Expires={}&X-Amz-Signature=sig{n}",
            expires_in.as_secs()
        ))
    }
}

pub fn backend_config(endpoint: &str, secret: &str) -> BackendConfig {
    BackendConfig {
        region: "auto".to_string(),
        access_key_id: "AKIATEST".to_string(),
        secret_access_key: secret.to_string(),
        endpoint: endpoint.to_string(),
        expiration_seconds: "3600".to_string(),
        default_bucket: "videos".to_string(),
    }
}

pub fn test_config() -> Config {
    Config {
        port: 0,
        is_dev: true,
        backends: vec![backend_config("https://storage.test", SECRET)],
        default_expiration_secs: 3600,
        ttl_margin_secs: 100,
        poster_ttl_secs: 2_592_000,
        upstream_timeout_ms: 1000,
        public_base_url: None,
        cache_store: CacheStoreType::Memory,
        valkey_url: None,
    }
}

/// State with a single fake backend; returns the store for assertions.
pub fn test_state(config: Config) -> (AppState, Arc<FakeStore>) {
    let store = Arc::new(FakeStore::default());
    let clients = config
        .backends
        .iter()
        .map(|backend| BackendClient::new(backend.clone(), store.clone()))
        .collect();
    let registry = BackendRegistry::new(clients).expect("at least one backend");
    let state = AppState::new(config, registry, Arc::new(MemoryStore::new()));
    (state, store)
}

/// Today's flush/clear proof for `secret`.
pub fn todays_proof(secret: &str) -> String {
    let day = sigil::proof::days_since_epoch(chrono::Utc::now());
    sigil::proof::compute_proof(secret, day)
}

pub fn yesterdays_proof(secret: &str) -> String {
    let day = sigil::proof::days_since_epoch(chrono::Utc::now());
    sigil::proof::compute_proof(secret, day - 1)
}
