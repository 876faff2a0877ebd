//! CORS preflight handling.
//!
//! Every `OPTIONS` request, on any path, is answered here with a fixed
//! policy. `Access-Control-Allow-Origin` itself is stamped on all
//! responses by the router.

use axum::{
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const ALLOW_METHODS: &str = "GET, HEAD, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, If-None-Match, Range";
/// Browsers may cache the preflight for 24 hours.
pub const MAX_AGE_SECS: &str = "86400";

/// Axum middleware: short-circuit `OPTIONS` with the preflight response.
pub async fn preflight(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return preflight_response();
    }
    next.run(req).await
}

fn preflight_response() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            ),
            (
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(MAX_AGE_SECS),
            ),
        ],
    )
        .into_response()
}
