//! Error types for the PDND client.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur anywhere in the client.
///
/// Every failure is raised where it is detected and propagated unchanged;
/// nothing in the crate retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PdndError {
    /// Missing or invalid key material, unknown environment, bad config file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-success HTTP response or malformed response body.
    ///
    /// `status` is 0 when the failure was detected locally, before any
    /// response was received.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code, or 0 for local failures.
        status: u16,
        /// Provider-supplied message when available.
        message: String,
    },

    /// Filter specification of an unsupported shape.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Token cache file exists but cannot be read, parsed, or written.
    #[error("Token cache error: {0}")]
    Cache(String),
}

/// Discriminant of a [`PdndError`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// [`PdndError::Config`]
    Config,
    /// [`PdndError::Api`]
    Api,
    /// [`PdndError::InvalidArgument`]
    InvalidArgument,
    /// [`PdndError::Cache`]
    Cache,
}

impl PdndError {
    /// Build an API error with the given status and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Build an API error from a non-success HTTP response.
    ///
    /// The message is the body's `error_description`, else its `error`, else
    /// the raw body (RFC 6749 §5.2 error responses).
    pub fn from_provider_response(status: u16, body: &str) -> Self {
        let parsed: ProviderErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .error_description
            .or(parsed.error)
            .unwrap_or_else(|| body.to_string());
        Self::api(status, message)
    }

    /// Build an API error for a failure detected before any network call.
    pub fn local(message: impl Into<String>) -> Self {
        Self::api(0, message)
    }

    /// Kind of this error, without its payload.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Api { .. } => ErrorKind::Api,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Cache(_) => ErrorKind::Cache,
        }
    }

    /// HTTP status carried by an API error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// OAuth-style error body returned by the token endpoint and e-services.
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Result type alias using `PdndError`
pub type Result<T> = std::result::Result<T, PdndError>;
