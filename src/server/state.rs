use crate::{
    backend::{BackendRegistry, fetcher::ObjectFetcher},
    cache::CacheCoordinator,
    config::Config,
    store::CacheStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Backend clients, built once at startup and never mutated
    pub backends: BackendRegistry,
    /// Bounded object fetches and URL signing
    pub fetcher: ObjectFetcher,
    /// Manifest/poster cache on top of the configured store
    pub cache: CacheCoordinator,
    /// Prometheus render handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, backends: BackendRegistry, store: Arc<dyn CacheStore>) -> Self {
        let fetcher = ObjectFetcher::new(
            Duration::from_millis(config.upstream_timeout_ms),
            config.default_expiration_secs,
        );
        let cache = CacheCoordinator::new(
            store,
            config.ttl_margin_secs,
            config.default_expiration_secs,
            Duration::from_secs(config.poster_ttl_secs),
        );

        Self {
            config: Arc::new(config),
            backends,
            fetcher,
            cache,
            metrics: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}
