use super::ObjectStore;
use crate::config::BackendConfig;
use crate::error::{Result, SigilError};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use axum::body::Bytes;
use std::time::Duration;
use tracing::info;

/// S3-compatible object store (AWS, R2, MinIO, ...).
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client with static credentials and a custom endpoint.
    ///
    /// Path-style addressing is forced so the bucket never has to be a
    /// DNS label on the endpoint host.
    pub async fn connect(config: &BackendConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "sigil",
        );

        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        info!(
            "Configured S3 backend {} (bucket: {})",
            config.endpoint, config.default_bucket
        );

        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    SigilError::NotFound(format!("{bucket}/{key}"))
                } else {
                    SigilError::BackendError(format!("GetObject {bucket}/{key} failed: {e}"))
                }
            })?;

        let body = response.body.collect().await.map_err(|e| {
            SigilError::BackendError(format!("Reading {bucket}/{key} failed: {e}"))
        })?;

        Ok(body.into_bytes())
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        let presign_cfg = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .map_err(|e| SigilError::SigningError(format!("Invalid presign config: {e}")))?;

        // SdkError display carries no credentials, only the operation failure.
        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_cfg)
            .await
            .map_err(|e| {
                SigilError::SigningError(format!("Presigning {bucket}/{key} failed: {e}"))
            })?;

        Ok(presigned.uri().to_string())
    }
}
