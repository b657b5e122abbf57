//! Error types for page fetching and index parsing.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single page request. Retried or not according to the retry policy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: BoxError,
    },
}

impl FetchError {
    /// Stricter classifier for callers that want to give up early: only timeouts, connection
    /// and body errors, HTTP 5xx, 408 and 429 count. The default policy retries everything.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::InvalidUrl { .. } => false,
            FetchError::Timeout { .. }
            | FetchError::Network { .. }
            | FetchError::BodyRead { .. } => true,
            FetchError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl { input, .. } => input,
            FetchError::Timeout { url }
            | FetchError::Network { url, .. }
            | FetchError::HttpStatus { url, .. }
            | FetchError::BodyRead { url, .. } => url,
        }
    }
}

/// Index-level failure. The run stops before any chapter is fetched.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid index URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Could not fetch chapter index: {0}")]
    Fetch(#[from] FetchError),

    #[error("Chapter listing container not found at {url} (selector or page layout may have changed).")]
    ListingNotFound { url: String },

    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}
