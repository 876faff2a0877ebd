//! Object store backends.
//!
//! Each configured credential set becomes a [`BackendClient`]: the
//! [`BackendConfig`] paired with an [`ObjectStore`] handle. The
//! [`BackendRegistry`] holds them all, read-only, for the life of the
//! process and hands out a uniformly random one per request.

pub mod fetcher;
pub mod s3;

use crate::config::BackendConfig;
use crate::error::{Result, SigilError};
use async_trait::async_trait;
use axum::body::Bytes;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Minimal object store capability the proxy needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full object body.
    ///
    /// Returns [`SigilError::NotFound`] when the key does not exist.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Produce a GET URL for the object valid for `expires_in`.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String>;
}

/// A backend configuration together with its store handle.
#[derive(Clone)]
pub struct BackendClient {
    pub config: BackendConfig,
    store: Arc<dyn ObjectStore>,
}

impl BackendClient {
    pub fn new(config: BackendConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Immutable list of backend clients.
#[derive(Clone, Debug)]
pub struct BackendRegistry {
    clients: Arc<[BackendClient]>,
}

impl BackendRegistry {
    /// Build a registry; an empty list is a configuration error.
    pub fn new(clients: Vec<BackendClient>) -> Result<Self> {
        if clients.is_empty() {
            return Err(SigilError::ConfigurationError(
                "at least one backend must be configured".to_string(),
            ));
        }
        Ok(Self {
            clients: clients.into(),
        })
    }

    /// Connect an S3 client for every configured backend.
    pub async fn connect(configs: &[BackendConfig]) -> Result<Self> {
        let mut clients = Vec::with_capacity(configs.len());
        for config in configs {
            let store = s3::S3ObjectStore::connect(config).await;
            clients.push(BackendClient::new(config.clone(), Arc::new(store)));
        }
        Self::new(clients)
    }

    /// Uniformly random backend; a single-entry registry always returns it.
    pub fn select_client(&self) -> &BackendClient {
        if self.clients.len() == 1 {
            return &self.clients[0];
        }
        let index = rand::thread_rng().gen_range(0..self.clients.len());
        &self.clients[index]
    }

    /// Secrets of every backend, used for proof code validation.
    pub fn secrets(&self) -> impl Iterator<Item = &str> {
        self.clients
            .iter()
            .map(|client| client.config.secret_access_key.as_str())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
