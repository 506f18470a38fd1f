use haystack_index::IndexError;
use haystack_types::{BundleName, TypeError};

/// Errors produced by the registry and the revision ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("bundle {bundle} is owned by another caller")]
    NotAllowed { bundle: BundleName },

    #[error("registration of bundle {bundle} still conflicting after {attempts} attempts")]
    RegistrationContended { bundle: BundleName, attempts: usize },

    #[error("cursor was issued for bundle {found}, not {expected}")]
    CursorMismatch {
        expected: BundleName,
        found: BundleName,
    },

    #[error("malformed cursor: {0}")]
    MalformedCursor(String),

    #[error("page size must be at least 1")]
    InvalidPageSize,

    #[error("invalid record: {0}")]
    InvalidRecord(#[from] TypeError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
