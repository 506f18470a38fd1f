use thiserror::Error;

/// Errors from metadata index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A transaction observed data that changed before it could commit.
    #[error("transaction conflict")]
    Conflict,

    /// A query start position could not be decoded.
    #[error("malformed query position: {0}")]
    MalformedPosition(String),

    /// A row value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The persisted snapshot is unreadable.
    #[error("corrupt index snapshot: {0}")]
    CorruptSnapshot(String),

    /// I/O error while persisting the index.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
