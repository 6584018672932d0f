//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use costlens_azure::AzureError;
use serde_json::json;
use thiserror::Error;

/// Message returned when Azure keeps throttling after all retries.
pub const RATE_LIMIT_MESSAGE: &str = "Azure API rate limit exceeded. Please try again later.";

/// Errors returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller input rejected before any outbound call.
    #[error("{0}")]
    BadRequest(String),

    /// Azure is throttling.
    #[error("{}", RATE_LIMIT_MESSAGE)]
    RateLimited,

    /// Any other Azure or internal failure.
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AzureError> for ApiError {
    fn from(e: AzureError) -> Self {
        match e {
            AzureError::RateLimited => ApiError::RateLimited,
            e if e.is_invalid_input() => ApiError::BadRequest(e.to_string()),
            e => ApiError::Upstream(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Upstream(message) => {
                tracing::error!(error = %message, "Upstream request failed");
            },
            ApiError::RateLimited => {
                tracing::warn!("Returning 429 after Azure rate limiting");
            },
            ApiError::BadRequest(_) => {},
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
