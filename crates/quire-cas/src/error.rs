//! Content store error types.

use std::io;

use quire_types::ContentId;
use thiserror::Error;

/// Content store error type.
#[derive(Debug, Error)]
pub enum CasError {
    /// No blob with this id.
    #[error("no such content: {0}")]
    NotFound(ContentId),

    /// Backing database failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl CasError {
    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this is a lookup miss rather than a store failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CasError::NotFound(_))
    }
}

/// Content store result type.
pub type CasResult<T> = Result<T, CasError>;
