use crate::{
    asset::{compute_etag, etag_matches},
    cache,
    error::Result,
    object_path::ObjectPath,
    server::state::AppState,
};
use axum::{
    body::Body,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::debug;

/// Serve a poster image with a content-hash ETag.
///
/// A matching `If-None-Match` against the cached ETag yields 304 without
/// touching the backend.
pub async fn serve_poster(state: &AppState, uri: &Uri, headers: &HeaderMap) -> Result<Response> {
    let client = state.backends.select_client();
    let bucket = client.config.default_bucket.as_str();

    let path = ObjectPath::resolve(uri.path(), bucket)?;
    let cache_key = cache::poster_key(&client.config.endpoint, bucket, &path.key);
    let cache_control = format!(
        "public, max-age={}, immutable",
        state.cache.poster_ttl().as_secs()
    );

    if let Some(candidate) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        && let Some(stored) = state.cache.lookup_etag(&cache_key).await
        && etag_matches(candidate, &stored)
    {
        debug!("Poster {} not modified", path.key);
        return Ok((
            StatusCode::NOT_MODIFIED,
            [
                (header::ETAG, stored),
                (header::CACHE_CONTROL, cache_control),
                (header::ACCESS_CONTROL_EXPOSE_HEADERS, "ETag".to_string()),
            ],
        )
            .into_response());
    }

    let body = state.fetcher.fetch_object(bucket, &path.key, client).await?;
    let etag = compute_etag(&body);
    state.cache.store_etag(&cache_key, &etag, Utc::now()).await;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg".to_string()),
            (header::ETAG, etag),
            (header::CACHE_CONTROL, cache_control),
            (header::ACCESS_CONTROL_EXPOSE_HEADERS, "ETag".to_string()),
        ],
        Body::from(body),
    )
        .into_response())
}
