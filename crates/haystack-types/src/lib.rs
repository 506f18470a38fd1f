//! Foundation types for the Haystack bundle store.
//!
//! This crate provides the identifiers, records and pagination types shared
//! by every other Haystack crate.
//!
//! # Key Types
//!
//! - [`BundleName`], [`OwnerId`], [`TagName`]: validated caller-supplied names
//! - [`Digest`]: SHA-512 content digest identifying one upload's bytes
//! - [`BundleOwner`], [`Revision`], [`Tag`]: the persisted records
//! - [`PageCursor`] / [`Page`]: bundle-scoped, opaque pagination
//! - [`Clock`] / [`SystemClock`]: strictly monotonic creation timestamps

pub mod cursor;
pub mod digest;
pub mod error;
pub mod names;
pub mod record;
pub mod temporal;

pub use cursor::{Page, PageCursor};
pub use digest::{Digest, DIGEST_LEN};
pub use error::TypeError;
pub use names::{BundleName, OwnerId, TagName, MAX_NAME_LEN};
pub use record::{BundleOwner, Revision, Tag};
pub use temporal::{order_key, Clock, SystemClock};

#[cfg(any(test, feature = "test-util"))]
pub use temporal::FixedClock;
