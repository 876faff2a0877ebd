use crate::{
    error::{Result, SigilError},
    metrics, proof,
    server::state::AppState,
};
use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct FlushParams {
    key: Option<String>,
}

/// Delete every cache entry. Requires today's proof code for any backend.
pub async fn flush_cache(
    State(state): State<AppState>,
    Query(params): Query<FlushParams>,
) -> Result<Response> {
    let start = Instant::now();

    let result = flush(&state, params).await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status_code(),
    };
    metrics::record_request("flush", status.as_u16());
    metrics::record_duration("flush", start);

    let deleted = result?;
    info!("Cache flush removed {} entries", deleted);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Cache cleared",
    )
        .into_response())
}

async fn flush(state: &AppState, params: FlushParams) -> Result<usize> {
    let code = params
        .key
        .filter(|key| !key.is_empty())
        .ok_or(SigilError::MissingProof)?;

    if !proof::verify_proof(&code, state.backends.secrets(), Utc::now()) {
        return Err(SigilError::InvalidProof);
    }

    state.cache.flush().await
}
