use crate::error::{Result, SigilError};
use std::env;
use std::fmt;

/// Signed URL lifetime used when a backend declares none (or garbage).
pub const DEFAULT_EXPIRATION_SECS: u64 = 3600;
/// Subtracted from the signed URL lifetime so cached manifests expire first.
pub const DEFAULT_TTL_MARGIN_SECS: u64 = 100;
/// Poster ETags are cached for 30 days.
pub const DEFAULT_POSTER_TTL_SECS: u64 = 30 * 24 * 60 * 60;
/// Upper bound for every object store call.
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 10_000;
/// Longest lifetime S3 accepts for a presigned URL (7 days).
pub const MAX_EXPIRATION_SECS: u64 = 7 * 24 * 60 * 60;
/// Poster ETags are never cached for more than a year.
pub const MAX_POSTER_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// One set of object store credentials.
///
/// `expiration_seconds` stays string-encoded as supplied; blank or
/// non-positive values mean "use the configured default".
#[derive(Clone, PartialEq)]
pub struct BackendConfig {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: String,
    pub expiration_seconds: String,
    pub default_bucket: String,
}

impl BackendConfig {
    /// Parsed signed URL lifetime, or `None` when absent or not a positive integer.
    pub fn declared_expiration_secs(&self) -> Option<u64> {
        self.expiration_seconds
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
    }
}

// Hand-written so secrets never end up in logs.
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("expiration_seconds", &self.expiration_seconds)
            .field("default_bucket", &self.default_bucket)
            .finish()
    }
}

/// Cache store backend selection
#[derive(Clone, Debug, PartialEq)]
pub enum CacheStoreType {
    Memory,
    Valkey,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// Ordered backend credential sets (never empty once loaded)
    pub backends: Vec<BackendConfig>,
    /// Lifetime applied when a backend declares no expiration
    pub default_expiration_secs: u64,
    /// Safety margin subtracted from the signed URL lifetime
    pub ttl_margin_secs: u64,
    /// TTL for cached poster ETags
    pub poster_ttl_secs: u64,
    /// Per-call timeout for object store requests
    pub upstream_timeout_ms: u64,
    /// Root for nested manifest URLs; falls back to the request host when unset
    pub public_base_url: Option<String>,
    pub cache_store: CacheStoreType,
    /// Valkey/Redis URL (used when cache_store = Valkey)
    pub valkey_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In DEV mode the port defaults to 3000. Backend credentials are
    /// always required.
    pub fn from_env() -> Result<Self> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| config_error(format!("PORT is not a valid port: {raw}")))?,
            Err(_) if is_dev => 3000,
            Err(_) => return Err(config_error("PORT is required in production")),
        };

        let backends = backends_from_env()?;

        let default_expiration_secs = parse_bounded(
            "DEFAULT_EXPIRATION_SECS",
            DEFAULT_EXPIRATION_SECS,
            MAX_EXPIRATION_SECS,
        )?;
        let ttl_margin_secs = parse_u64("CACHE_TTL_MARGIN_SECS", DEFAULT_TTL_MARGIN_SECS)?;
        let poster_ttl_secs =
            parse_bounded("POSTER_TTL_SECS", DEFAULT_POSTER_TTL_SECS, MAX_POSTER_TTL_SECS)?;
        let upstream_timeout_ms = parse_u64("UPSTREAM_TIMEOUT_MS", DEFAULT_UPSTREAM_TIMEOUT_MS)?;

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        if let Some(base) = &public_base_url {
            url::Url::parse(base)
                .map_err(|e| config_error(format!("PUBLIC_BASE_URL is not a URL: {e}")))?;
        }

        let cache_store = match env::var("CACHE_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "valkey" | "redis" => CacheStoreType::Valkey,
            _ => CacheStoreType::Memory,
        };
        let valkey_url = env::var("VALKEY_URL").ok();

        if cache_store == CacheStoreType::Valkey && valkey_url.is_none() {
            return Err(config_error("VALKEY_URL is required when CACHE_STORE=valkey"));
        }

        Ok(Config {
            port,
            is_dev,
            backends,
            default_expiration_secs,
            ttl_margin_secs,
            poster_ttl_secs,
            upstream_timeout_ms,
            public_base_url,
            cache_store,
            valkey_url,
        })
    }
}

/// Assemble backend records from the comma-separated parallel arrays.
fn backends_from_env() -> Result<Vec<BackendConfig>> {
    let regions = required_list("S3_REGION")?;
    let access_keys = required_list("S3_ACCESS_KEY_ID")?;
    let secrets = required_list("S3_SECRET_ACCESS_KEY")?;
    let endpoints = required_list("S3_ENDPOINT")?;
    let buckets = required_list("S3_BUCKET")?;

    let count = regions.len();
    for (name, len) in [
        ("S3_ACCESS_KEY_ID", access_keys.len()),
        ("S3_SECRET_ACCESS_KEY", secrets.len()),
        ("S3_ENDPOINT", endpoints.len()),
        ("S3_BUCKET", buckets.len()),
    ] {
        if len != count {
            return Err(config_error(format!(
                "{name} has {len} entries but S3_REGION has {count}"
            )));
        }
    }

    // Expirations may be omitted entirely; blank entries fall back to the default.
    let expirations = match env::var("S3_EXPIRATION") {
        Ok(raw) => {
            let list = split_list(&raw);
            if list.len() != count {
                return Err(config_error(format!(
                    "S3_EXPIRATION has {} entries but S3_REGION has {count}",
                    list.len()
                )));
            }
            list
        }
        Err(_) => vec![String::new(); count],
    };

    let mut backends = Vec::with_capacity(count);
    for i in 0..count {
        let backend = BackendConfig {
            region: regions[i].clone(),
            access_key_id: access_keys[i].clone(),
            secret_access_key: secrets[i].clone(),
            endpoint: endpoints[i].clone(),
            expiration_seconds: expirations[i].clone(),
            default_bucket: buckets[i].clone(),
        };
        validate_backend(i, &backend)?;
        backends.push(backend);
    }

    Ok(backends)
}

/// Every credential field must be non-empty and a declared expiration must
/// be one S3 can presign.
pub fn validate_backend(index: usize, backend: &BackendConfig) -> Result<()> {
    for (name, value) in [
        ("S3_REGION", &backend.region),
        ("S3_ACCESS_KEY_ID", &backend.access_key_id),
        ("S3_SECRET_ACCESS_KEY", &backend.secret_access_key),
        ("S3_ENDPOINT", &backend.endpoint),
        ("S3_BUCKET", &backend.default_bucket),
    ] {
        if value.is_empty() {
            return Err(config_error(format!("{name} entry {index} is empty")));
        }
    }
    if let Some(secs) = backend.declared_expiration_secs()
        && secs > MAX_EXPIRATION_SECS
    {
        return Err(config_error(format!(
            "S3_EXPIRATION entry {index} is {secs}s, above the {MAX_EXPIRATION_SECS}s maximum"
        )));
    }
    Ok(())
}

fn required_list(name: &str) -> Result<Vec<String>> {
    let raw = env::var(name).map_err(|_| config_error(format!("{name} is required")))?;
    let list = split_list(&raw);
    if list.iter().all(|entry| entry.is_empty()) {
        return Err(config_error(format!("{name} must not be empty")));
    }
    Ok(list)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.trim().to_string()).collect()
}

fn parse_u64(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| config_error(format!("{name} must be a non-negative integer"))),
        Err(_) => Ok(default),
    }
}

fn parse_bounded(name: &str, default: u64, max: u64) -> Result<u64> {
    let value = parse_u64(name, default)?;
    if value > max {
        return Err(config_error(format!("{name} must be at most {max}")));
    }
    Ok(value)
}

fn config_error(msg: impl Into<String>) -> SigilError {
    SigilError::ConfigurationError(msg.into())
}
