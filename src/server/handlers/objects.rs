use super::{manifest, poster};
use crate::{asset::POSTER_SUFFIX, hls::MANIFEST_EXTENSION, metrics, server::state::AppState};
use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::time::Instant;

/// What a request path addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Manifest,
    Poster,
    Unknown,
}

pub fn classify(path: &str) -> ObjectKind {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(MANIFEST_EXTENSION) {
        ObjectKind::Manifest
    } else if lower.ends_with(POSTER_SUFFIX) {
        ObjectKind::Poster
    } else {
        ObjectKind::Unknown
    }
}

/// Fallback handler: route bucket objects by suffix.
pub async fn serve_object(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD, OPTIONS")],
            "Method Not Allowed\n",
        )
            .into_response();
    }

    let start = Instant::now();
    let (endpoint, response) = match classify(uri.path()) {
        ObjectKind::Manifest => (
            "manifest",
            manifest::serve_manifest(&state, &uri, &headers)
                .await
                .into_response(),
        ),
        ObjectKind::Poster => (
            "poster",
            poster::serve_poster(&state, &uri, &headers)
                .await
                .into_response(),
        ),
        ObjectKind::Unknown => return (StatusCode::NOT_FOUND, "Not Found\n").into_response(),
    };

    metrics::record_request(endpoint, response.status().as_u16());
    metrics::record_duration(endpoint, start);

    response
}
