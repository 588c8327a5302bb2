//! Error types for mirror persistence.

use thiserror::Error;

/// Mirror database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A query failed to execute.
    #[error("query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// A mirrored row that was expected to exist is missing.
    #[error("not found in mirror: {0}")]
    NotFound(String),
}

impl DbError {
    /// Whether this error indicates the database itself is gone, which is
    /// fatal for a reconciliation run.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }
}
