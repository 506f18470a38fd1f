/// Errors from object backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The object path is not a valid relative, slash-separated path.
    #[error("invalid object path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A list position could not be decoded.
    #[error("invalid list position: {0}")]
    InvalidPosition(String),

    /// A backend call did not complete within the configured timeout.
    #[error("{operation} on {path:?} timed out")]
    Timeout {
        operation: &'static str,
        path: String,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
