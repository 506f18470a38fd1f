//! Bundle ownership and revision history for the Haystack bundle store.
//!
//! This crate provides:
//! - [`BundleRegistry`]: first-writer-wins binding of a bundle name to an
//!   owner, established inside an optimistic index transaction
//! - [`RevisionLedger`]: one immutable, timestamped [`Revision`] row per
//!   (bundle, digest), listed newest first
//! - [`list_newest_first`]: bundle-scoped cursor pagination shared with the
//!   tag index
//!
//! [`Revision`]: haystack_types::Revision

pub mod error;
pub mod paging;
pub mod registry;
pub mod revisions;

pub use error::{LedgerError, LedgerResult};
pub use paging::list_newest_first;
pub use registry::{BundleRegistry, Ownership, DEFAULT_REGISTRATION_ATTEMPTS, OWNER_KIND};
pub use revisions::{RevisionLedger, REVISION_KIND};
