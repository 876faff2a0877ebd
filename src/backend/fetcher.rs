//! Object fetching and URL signing with bounded upstream calls.

use super::BackendClient;
use crate::config::{DEFAULT_EXPIRATION_SECS, DEFAULT_UPSTREAM_TIMEOUT_MS};
use crate::error::{Result, SigilError};
use crate::metrics;
use axum::body::Bytes;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct ObjectFetcher {
    timeout: Duration,
    default_expiration_secs: u64,
}

impl ObjectFetcher {
    pub fn new(timeout: Duration, default_expiration_secs: u64) -> Self {
        Self {
            timeout,
            default_expiration_secs,
        }
    }

    /// Signed URL lifetime for `client`, with the default substituted.
    pub fn expiration_secs(&self, client: &BackendClient) -> u64 {
        client
            .config
            .declared_expiration_secs()
            .unwrap_or(self.default_expiration_secs)
    }

    /// Fetch the raw object bytes. An empty body counts as a backend failure.
    pub async fn fetch_object(
        &self,
        bucket: &str,
        key: &str,
        client: &BackendClient,
    ) -> Result<Bytes> {
        if bucket.is_empty() || key.is_empty() {
            return Err(SigilError::InvalidRequest(
                "bucket and key are required".to_string(),
            ));
        }

        debug!("Fetching {}/{} from {}", bucket, key, client.config.endpoint);

        let body = tokio::time::timeout(self.timeout, client.store().get_object(bucket, key))
            .await
            .map_err(|_| {
                SigilError::BackendError(format!(
                    "GetObject {bucket}/{key} timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })??;

        if body.is_empty() {
            return Err(SigilError::BackendError(format!(
                "Object {bucket}/{key} has an empty body"
            )));
        }

        Ok(body)
    }

    /// Produce a signed GET URL valid for the backend's expiration.
    pub async fn sign_url(
        &self,
        bucket: &str,
        key: &str,
        client: &BackendClient,
    ) -> Result<String> {
        if bucket.is_empty() || key.is_empty() {
            return Err(SigilError::SigningError(
                "bucket and key are required for signing".to_string(),
            ));
        }

        let expires_in = Duration::from_secs(self.expiration_secs(client));

        let url = tokio::time::timeout(
            self.timeout,
            client.store().presign_get(bucket, key, expires_in),
        )
        .await
        .map_err(|_| {
            SigilError::SigningError(format!(
                "Signing {bucket}/{key} timed out after {}ms",
                self.timeout.as_millis()
            ))
        })?
        // Any store failure during signing is a signing failure.
        .map_err(|e| match e {
            SigilError::SigningError(_) => e,
            other => SigilError::SigningError(other.to_string()),
        })?;

        metrics::record_signed_url();
        Ok(url)
    }
}

impl Default for ObjectFetcher {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            DEFAULT_EXPIRATION_SECS,
        )
    }
}
