use super::{query_param, request_base_url};
use crate::{
    cache::{self, CachedManifest},
    error::{Result, SigilError},
    hls::{RewriteContext, rewrite_manifest},
    object_path::ObjectPath,
    proof,
    server::state::AppState,
};
use axum::{
    http::{HeaderMap, HeaderName, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::info;

pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Serve a manifest with every segment reference replaced by a signed URL.
///
/// `?clear-cache=<proof>` drops the cached copy first; an invalid proof
/// rejects the request.
pub async fn serve_manifest(state: &AppState, uri: &Uri, headers: &HeaderMap) -> Result<Response> {
    let client = state.backends.select_client();
    let bucket = client.config.default_bucket.as_str();

    let path = ObjectPath::resolve(uri.path(), bucket)?;
    cache::validate_manifest_key(&path.key)?;
    let cache_key = cache::manifest_key(&client.config.endpoint, bucket, &path.key);

    if let Some(code) = query_param(uri, "clear-cache") {
        if code.is_empty() {
            return Err(SigilError::MissingProof);
        }
        if !proof::verify_proof(&code, state.backends.secrets(), Utc::now()) {
            return Err(SigilError::InvalidProof);
        }
        state.cache.invalidate(&cache_key).await?;
    }

    let request_base = request_base_url(
        state.config.public_base_url.as_deref(),
        uri,
        headers,
        &path.request_dir,
    )?;

    let ttl_secs = state
        .cache
        .manifest_ttl_secs(client.config.declared_expiration_secs());
    let fetcher = &state.fetcher;

    let manifest: CachedManifest = state
        .cache
        .get_or_generate(&cache_key, ttl_secs, Utc::now(), |expires_at| async move {
            info!("Rewriting manifest {}/{}", bucket, path.key);

            let raw = fetcher.fetch_object(bucket, &path.key, client).await?;
            let text = String::from_utf8(raw.to_vec()).map_err(|_| {
                SigilError::BackendError(format!("manifest {}/{} is not UTF-8", bucket, path.key))
            })?;

            let ctx = RewriteContext {
                path_in_bucket: &path.path_in_bucket,
                request_base: &request_base,
                expires_at,
            };
            rewrite_manifest(&text, &ctx, |key| async move {
                fetcher.sign_url(bucket, &key, client).await
            })
            .await
        })
        .await?;

    let max_age = cache::max_age(manifest.expiration, Utc::now());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HLS_CONTENT_TYPE.to_string()),
            (header::CACHE_CONTROL, format!("public, max-age={max_age}")),
            (
                HeaderName::from_static("x-cache"),
                manifest.status.as_str().to_string(),
            ),
        ],
        manifest.body,
    )
        .into_response())
}
