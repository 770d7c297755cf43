use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of the `errors` array the API attaches to failed calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Main error type for Tumblr API operations
#[derive(Debug, Error)]
pub enum TumblrError {
    /// Invalid client configuration (partial OAuth1 credentials, malformed base URL)
    #[error("configuration error: {0}")]
    Config(String),

    /// Credentials found inconsistent while signing a request
    #[error("authentication error: {0}")]
    Auth(String),

    /// The transport failed before a response was obtained
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The API answered with a non-success status
    #[error("HTTP error {status}: {message}")]
    Http {
        status: u16,
        message: String,
        details: Vec<ApiErrorDetail>,
    },

    /// The API answered but the body is not a valid envelope
    #[error("invalid response envelope (HTTP {status}): {reason}; body: {body}")]
    Envelope {
        status: u16,
        reason: String,
        body: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Request building error
    #[error("failed to build request: {0}")]
    RequestBuild(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TumblrError {
    /// Create a new HTTP error
    pub fn http(status: u16, message: impl Into<String>, details: Vec<ApiErrorDetail>) -> Self {
        TumblrError::Http {
            status,
            message: message.into(),
            details,
        }
    }

    /// Check if this error is a permission denied error (401/403)
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, TumblrError::Http { status: 401 | 403, .. })
    }

    /// Check if this error is a not found error (404)
    pub fn is_not_found(&self) -> bool {
        matches!(self, TumblrError::Http { status: 404, .. })
    }

    /// Check if the request never produced a response
    pub fn is_transport(&self) -> bool {
        matches!(self, TumblrError::Transport(_))
    }

    /// Get the HTTP status code if a response was received
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TumblrError::Http { status, .. } | TumblrError::Envelope { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for Tumblr API operations
pub type Result<T> = std::result::Result<T, TumblrError>;
