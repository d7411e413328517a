//! API error type with HTTP response mapping.
//!
//! Handlers return `Result<T, ApiError>`; every variant maps to a status
//! and a JSON error body. Internal detail never reaches the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-level error type for the cart API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or unverifiable bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Well-formed request with invalid content.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
