//! Reconciliation error types.

use enturma_db::DbError;
use enturma_directory::DirectoryError;
use thiserror::Error;

/// Errors that can end a reconciliation run.
///
/// Per-record problems never surface here — they are converted into
/// structured record outcomes at the record boundary.  What remains is
/// what genuinely halts a run: rejected credentials, a lost database, or
/// a configuration that cannot be acted on.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Directory error that escaped the per-record boundary.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Source-of-record or mirror query failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Mirror persistence failure.
    #[error("mirror error: {0}")]
    Mirror(#[from] DbError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl SyncError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether no further work in this run can succeed.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Directory(e) => e.is_auth(),
            SyncError::Database(_) | SyncError::Mirror(_) | SyncError::Configuration { .. } => true,
        }
    }
}

/// Result type for reconciliation operations.
pub type SyncResult<T> = Result<T, SyncError>;
