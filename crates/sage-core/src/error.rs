use core::result::Result as CoreResult;
use std::io::Error as IoError;

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur across the retrieval engine.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied input was rejected before any external call.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The embedding provider failed to produce a vector.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// A provider rejected the request due to rate limiting.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The vector store backing representation is unreachable or unreadable.
    ///
    /// Distinct from a reachable store with zero matches, which is a valid
    /// empty result, never an error.
    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// An external provider encountered an error.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Returns `true` for transient errors like network failures or rate
    /// limiting. Auth and malformed-input failures are permanent and must
    /// propagate immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::RateLimited(_) | Self::Provider(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as JsonValue, from_str};
    use std::io;

    #[test]
    fn test_error_display() {
        let error1 = Error::Config("missing model".to_owned());
        assert_eq!(error1.to_string(), "Configuration error: missing model");

        let error2 = Error::Validation("empty question".to_owned());
        assert_eq!(error2.to_string(), "Invalid input: empty question");

        let error3 = Error::StoreUnavailable("connection refused".to_owned());
        assert_eq!(
            error3.to_string(),
            "Vector store unavailable: connection refused"
        );
    }

    #[test]
    fn test_error_is_retryable() {
        // Retryable errors
        let error1 = Error::RateLimited("429".to_owned());
        assert!(error1.is_retryable());

        let error2 = Error::Provider("timeout".to_owned());
        assert!(error2.is_retryable());

        // Non-retryable errors
        let error3 = Error::Validation("too long".to_owned());
        assert!(!error3.is_retryable());

        let error4 = Error::Embedding("dimension mismatch".to_owned());
        assert!(!error4.is_retryable());

        let error5 = Error::StoreUnavailable("missing file".to_owned());
        assert!(!error5.is_retryable());
    }

    #[test]
    fn test_error_from_io() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_error = from_str::<JsonValue>("invalid json").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Json(_)));
    }
}
