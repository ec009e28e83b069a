//! Application error type mapping to HTTP status codes and JSON bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use parley_types::quota::QuotaExceededBody;

/// Message returned with HTTP 429.
pub const QUOTA_EXCEEDED_MESSAGE: &str = "Daily usage limit exceeded";

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The client has used its daily allowance.
    QuotaExceeded {
        /// Whole hours until the next reset.
        remaining_time: u32,
    },
    /// The request could not be attributed to a client.
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::QuotaExceeded { remaining_time } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(QuotaExceededBody {
                    error: QUOTA_EXCEEDED_MESSAGE.to_string(),
                    remaining_time,
                }),
            )
                .into_response(),
            AppError::BadRequest(message) => {
                tracing::debug!(error = %message, "Rejected request");
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
        }
    }
}
