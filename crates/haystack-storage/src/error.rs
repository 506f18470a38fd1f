use std::error::Error as StdError;

use haystack_index::IndexError;
use haystack_ledger::LedgerError;
use haystack_refs::RefError;
use haystack_store::StoreError;
use haystack_types::TypeError;
use thiserror::Error;

/// Fieldless classification of a [`StorageError`], for callers that map
/// errors onto status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotAllowed,
    RevisionNotFound,
    TagNotFound,
    Backend,
}

/// Errors returned by [`Storage`](crate::Storage) operations.
///
/// Lower layers never leak their own not-found vocabulary: a missing object
/// surfaces as [`RevisionNotFound`](StorageError::RevisionNotFound), a
/// missing tag row as [`TagNotFound`](StorageError::TagNotFound), and
/// anything else as [`Backend`](StorageError::Backend).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("bundle {bundle} belongs to another owner")]
    NotAllowed { bundle: String },

    #[error("revision {digest} not found in bundle {bundle}")]
    RevisionNotFound { bundle: String, digest: String },

    #[error("tag {tag} not found in bundle {bundle}")]
    TagNotFound { bundle: String, tag: String },

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StorageError::NotAllowed { .. } => ErrorKind::NotAllowed,
            StorageError::RevisionNotFound { .. } => ErrorKind::RevisionNotFound,
            StorageError::TagNotFound { .. } => ErrorKind::TagNotFound,
            StorageError::Backend { .. } => ErrorKind::Backend,
        }
    }

    /// Wrap a lower-level failure with a short description of the step.
    pub fn backend(
        context: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        StorageError::Backend {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    fn bare_backend(context: impl Into<String>) -> Self {
        StorageError::Backend {
            context: context.into(),
            source: None,
        }
    }
}

impl From<TypeError> for StorageError {
    fn from(e: TypeError) -> Self {
        StorageError::InvalidArgument(e.to_string())
    }
}

impl From<StoreError> for StorageError {
    fn from(e: StoreError) -> Self {
        match e {
            // Paths are derived from validated names; a missing object at
            // this level is an unexpected backend state.
            StoreError::NotFound(path) => {
                StorageError::bare_backend(format!("object unexpectedly missing: {path}"))
            }
            other => StorageError::backend("object backend", other),
        }
    }
}

impl From<IndexError> for StorageError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::MalformedPosition(reason) => {
                StorageError::InvalidArgument(format!("malformed cursor: {reason}"))
            }
            other => StorageError::backend("metadata index", other),
        }
    }
}

impl From<LedgerError> for StorageError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotAllowed { bundle } => StorageError::NotAllowed {
                bundle: bundle.to_string(),
            },
            LedgerError::CursorMismatch { .. }
            | LedgerError::MalformedCursor(_)
            | LedgerError::InvalidPageSize => StorageError::InvalidArgument(e.to_string()),
            LedgerError::Index(inner) => inner.into(),
            LedgerError::RegistrationContended { .. } | LedgerError::InvalidRecord(_) => {
                StorageError::backend("ledger", e)
            }
        }
    }
}

impl From<RefError> for StorageError {
    fn from(e: RefError) -> Self {
        match e {
            RefError::RevisionNotFound { bundle, digest } => StorageError::RevisionNotFound {
                bundle: bundle.to_string(),
                digest: digest.to_hex(),
            },
            RefError::TagNotFound { bundle, tag } => StorageError::TagNotFound {
                bundle: bundle.to_string(),
                tag: tag.to_string(),
            },
            RefError::Ledger(inner) => inner.into(),
            RefError::Index(inner) => inner.into(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
