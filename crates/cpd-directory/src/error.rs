//! Error types for the Directory client

use serde::Deserialize;
use thiserror::Error;

/// Result type alias for Directory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Directory client
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication failed (401, token exchange, missing token)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization failed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists (409), e.g. an alias already in use
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request rejected by the API (400, 412, 422)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limit exceeded (429)
    #[error("Rate limit exceeded: retry after {retry_after:?}")]
    RateLimited {
        retry_after: Option<std::time::Duration>,
    },

    /// Server error (5xx)
    #[error("Server error: {0}")]
    Server(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local filesystem error (client secret, token cache)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Google API error envelope: `{"error": {"code": 404, "message": "..."}}`
#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
}

impl Error {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. } | Error::Server(_))
    }

    /// The record (customer, user, group) does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Create an error from an HTTP status code and response body.
    ///
    /// The Google error envelope is unwrapped to its message when present.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        let message = serde_json::from_str::<GoogleErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(body);

        match status.as_u16() {
            400 | 412 | 422 => Error::Validation(message),
            401 => Error::Authentication(message),
            403 => Error::Forbidden(message),
            404 => Error::NotFound(message),
            409 => Error::Conflict(message),
            429 => Error::RateLimited { retry_after: None },
            500..=599 => Error::Server(message),
            _ => Error::Other(format!("HTTP {}: {}", status, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_google_envelope_is_unwrapped() {
        let body = r#"{"error":{"code":404,"message":"Resource Not Found: userKey","errors":[]}}"#;
        let err = Error::from_status(StatusCode::NOT_FOUND, body.to_string());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: Resource Not Found: userKey");
    }

    #[test]
    fn test_plain_body_is_kept() {
        let err = Error::from_status(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert!(matches!(err, Error::Server(ref m) if m == "upstream down"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_conflict_is_not_retryable() {
        let body = r#"{"error":{"code":409,"message":"Entity already exists."}}"#;
        let err = Error::from_status(StatusCode::CONFLICT, body.to_string());
        assert!(matches!(err, Error::Conflict(_)));
        assert!(!err.is_retryable());
    }
}
