pub mod cors;
pub mod handlers;
pub mod state;

use crate::{
    backend::BackendRegistry,
    config::{CacheStoreType, Config},
    error::{Result, SigilError},
    metrics,
    store::{CacheStore, memory::MemoryStore},
};
use axum::{
    Router,
    http::{HeaderName, HeaderValue, header},
    middleware,
    routing::get,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

/// Build the full router without binding a listener.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/robots.txt", get(handlers::health::robots_txt))
        .route("/favicon.ico", get(handlers::health::favicon))
        .route("/metrics", get(handlers::health::metrics))
        .route("/flush-cache", get(handlers::flush::flush_cache))
        // Manifests and posters are matched by suffix, which axum paths cannot express
        .fallback(handlers::objects::serve_object)
        .layer(middleware::from_fn(cors::preflight))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-sigil-version"),
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cache store selected by configuration.
pub async fn build_store(config: &Config) -> Result<Arc<dyn CacheStore>> {
    match config.cache_store {
        CacheStoreType::Memory => {
            info!("Using in-memory cache store");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "valkey")]
        CacheStoreType::Valkey => {
            let url = config.valkey_url.as_deref().ok_or_else(|| {
                SigilError::ConfigurationError("VALKEY_URL is required".to_string())
            })?;
            Ok(Arc::new(crate::store::valkey::ValkeyStore::connect(url).await?))
        }
        #[cfg(not(feature = "valkey"))]
        CacheStoreType::Valkey => Err(SigilError::ConfigurationError(
            "CACHE_STORE=valkey requires the `valkey` feature".to_string(),
        )),
    }
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    // Clients are built exactly once; no traffic is served if this fails.
    let backends = BackendRegistry::connect(&config.backends).await?;
    let store = build_store(&config).await?;

    let state = AppState::new(config, backends, store).with_metrics(metrics::install_recorder());
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("🚀 Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
