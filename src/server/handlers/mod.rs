pub mod flush;
pub mod health;
pub mod manifest;
pub mod objects;
pub mod poster;

use crate::error::{Result, SigilError};
use axum::http::{HeaderMap, Uri, header};
use url::Url;

/// First value of query parameter `name`, decoded.
pub(crate) fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Absolute URL of `request_dir` as seen by the client.
///
/// Uses `PUBLIC_BASE_URL` when configured, otherwise the request's host
/// (`Host` header or absolute URI) and `X-Forwarded-Proto` (default `http`).
pub(crate) fn request_base_url(
    public_base_url: Option<&str>,
    uri: &Uri,
    headers: &HeaderMap,
    request_dir: &str,
) -> Result<Url> {
    let origin = match public_base_url {
        Some(base) => base.to_string(),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .or_else(|| uri.authority().map(|a| a.to_string()))
                .filter(|h| !h.is_empty())
                .ok_or_else(|| SigilError::InvalidRequest("missing Host header".to_string()))?;

            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|s| *s == "http" || *s == "https")
                .unwrap_or("http");

            format!("{scheme}://{host}")
        }
    };

    Url::parse(&format!("{origin}{request_dir}"))
        .map_err(|e| SigilError::InvalidRequest(format!("malformed request URL: {e}")))
}
