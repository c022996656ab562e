//! Error types for Umbrella API operations.
//!
//! Every failure the client can surface maps onto one variant of [`Error`]:
//! token exchange problems, non-success API responses, transport failures and
//! undecodable bodies each stay distinguishable for callers.

use serde::Serialize;
use thiserror::Error;

/// Main error type for Umbrella operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The OAuth2 token exchange failed (bad credentials, rejected grant,
    /// undecodable token response).
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The Umbrella API answered with a non-success status code.
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code returned by the API
        status: u16,
        /// Raw response body, preserved verbatim
        body: String,
    },

    /// The request never produced an HTTP response (DNS, connect, TLS, timeout).
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A response body was not valid JSON or lacked the expected envelope.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Request rejected locally before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Specialized result type for Umbrella operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// HTTP status of the failed API call, when there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "AUTHENTICATION_FAILED",
            Self::Api { .. } => "API_ERROR",
            Self::Connectivity(_) => "CONNECTIVITY_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// HTTP status code carried by [`Error::Api`].
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                status: self.status(),
                message: self.to_string(),
            },
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        match self {
            Self::Authentication(_) | Self::Config(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Connectivity(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Config(format!("Invalid configuration: {err}"))
    }
}
