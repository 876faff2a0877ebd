use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

pub type Result<T> = std::result::Result<T, SigilError>;

#[derive(Debug, Error)]
pub enum SigilError {
    /// Fatal at startup: the process must not serve traffic.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Cache store error: {0}")]
    CacheError(String),

    #[error("Missing proof code")]
    MissingProof,

    #[error("Invalid proof code")]
    InvalidProof,
}

impl SigilError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SigilError::InvalidRequest(_) | SigilError::MissingProof => StatusCode::BAD_REQUEST,
            SigilError::InvalidProof => StatusCode::FORBIDDEN,
            SigilError::NotFound(_) => StatusCode::NOT_FOUND,
            SigilError::ConfigurationError(_)
            | SigilError::BackendError(_)
            | SigilError::SigningError(_)
            | SigilError::CacheError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SigilError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Upstream detail stays in the logs; clients only see the status text.
        let body = match &self {
            SigilError::InvalidRequest(msg) => {
                warn!("Rejected request: {}", msg);
                format!("Bad Request: {}\n", msg)
            }
            SigilError::MissingProof => "Missing key\n".to_string(),
            SigilError::InvalidProof => {
                warn!("Rejected invalid proof code");
                "Forbidden\n".to_string()
            }
            SigilError::NotFound(key) => {
                warn!("Object not found: {}", key);
                "Not Found\n".to_string()
            }
            other => {
                error!("Request failed: {}", other);
                "Internal Server Error\n".to_string()
            }
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}
