//! Error types for directory operations.

use thiserror::Error;

/// Errors returned by the remote student directory.
///
/// The taxonomy drives run behavior: transient errors are retried and then
/// skipped, validation errors are recovered from (the resource already
/// exists), and authentication errors abort the whole run since no further
/// call can succeed.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory could not be reached (connection failure or timeout).
    #[error("directory unreachable: {0}")]
    Unreachable(String),

    /// The directory rejected our credentials (HTTP 401/403).
    #[error("directory rejected authentication (HTTP {status}): {detail}")]
    Auth { status: u16, detail: String },

    /// The directory rejected the payload (HTTP 400).  On create this
    /// usually means the resource already exists.
    #[error("directory rejected the request (HTTP 400): {detail}")]
    Validation { detail: String },

    /// The resource does not exist on the directory (HTTP 404).
    #[error("not found on directory: {0}")]
    NotFound(String),

    /// The directory is throttling us (HTTP 429).
    #[error("rate limited by directory")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-success HTTP status (5xx are retryable).
    #[error("directory returned HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    /// The response body could not be decoded.
    #[error("failed to parse directory response: {0}")]
    Parse(String),

    /// A retried operation ran out of attempts.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<DirectoryError>,
    },
}

impl DirectoryError {
    /// Whether the operation may succeed if repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            DirectoryError::Unreachable(_) | DirectoryError::RateLimited { .. } => true,
            DirectoryError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the error means no remote call can succeed this run.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        match self {
            DirectoryError::Auth { .. } => true,
            DirectoryError::RetriesExhausted { source, .. } => source.is_auth(),
            _ => false,
        }
    }

    /// Whether the directory rejected a create because the resource
    /// already exists.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, DirectoryError::Validation { .. })
    }
}

impl From<reqwest::Error> for DirectoryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            DirectoryError::Unreachable(e.to_string())
        } else if e.is_decode() {
            DirectoryError::Parse(e.to_string())
        } else {
            DirectoryError::Unreachable(e.to_string())
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
