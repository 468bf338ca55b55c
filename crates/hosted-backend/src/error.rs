//! Error types for the hosted backend client.

use thiserror::Error;

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse a response body
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The backend returned no row where exactly one was expected
    #[error("Expected a row from '{0}' but the response was empty")]
    EmptyResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl BackendError {
    /// Whether the backend rejected the credentials (expired or revoked token).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::ApiError { status: 401, .. })
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::ParseError(err.to_string())
    }
}

impl From<url::ParseError> for BackendError {
    fn from(err: url::ParseError) -> Self {
        BackendError::ConfigError(err.to_string())
    }
}
