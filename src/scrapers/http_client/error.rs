//! Fetch failure taxonomy.

use thiserror::Error;

/// Why a page could not be fetched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Not an absolute http(s) URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection, TLS, timeout or body-read failure.
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Non-200 response.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// The body could not be turned into a document.
    #[error("unparseable response from {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl FetchError {
    /// Whether another attempt may succeed: network failures, server
    /// errors and parse failures. 403, 404 and other statuses are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidUrl(_) => false,
            Self::Network { .. } | Self::Parse { .. } => true,
            Self::HttpStatus { status, .. } => (500..600).contains(status),
        }
    }

    pub fn network(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
