//! Error types for tag operations.

use haystack_index::IndexError;
use haystack_ledger::LedgerError;
use haystack_types::{BundleName, Digest, TagName};
use thiserror::Error;

/// Errors that can occur during tag operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The tag would point at a digest the bundle has no revision for.
    #[error("no revision {digest} in bundle {bundle}")]
    RevisionNotFound { bundle: BundleName, digest: Digest },

    /// The tag does not exist.
    #[error("tag {tag} not found in bundle {bundle}")]
    TagNotFound { bundle: BundleName, tag: TagName },

    /// Revision lookup or pagination failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Index read or write failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Convenience type alias for tag operations.
pub type Result<T> = std::result::Result<T, RefError>;
