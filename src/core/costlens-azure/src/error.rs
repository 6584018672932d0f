//! Azure client error types.

use thiserror::Error;

/// Errors that can occur while talking to Azure.
#[derive(Debug, Error)]
pub enum AzureError {
    /// Azure answered 429 Too Many Requests.
    #[error("Azure API rate limit exceeded")]
    RateLimited,

    /// Azure answered with a non-success status.
    #[error("Azure API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// ARM error code, when the body carried one.
        code: Option<String>,
        /// Error message.
        message: String,
    },

    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No access token could be obtained.
    #[error("credential error: {0}")]
    Credential(String),

    /// Date not in `YYYY-MM-DD` form.
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Start date after end date.
    #[error("invalid date range: {from} is after {to}")]
    InvalidRange {
        /// Start date.
        from: String,
        /// End date.
        to: String,
    },

    /// Subscription id or resource group name that is not a single ARM
    /// path segment.
    #[error("invalid {kind} '{value}'")]
    InvalidIdentifier {
        /// Which identifier was rejected.
        kind: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl AzureError {
    /// Returns true for errors caused by the caller's input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            AzureError::InvalidDate(_)
                | AzureError::InvalidRange { .. }
                | AzureError::InvalidIdentifier { .. }
        )
    }
}
