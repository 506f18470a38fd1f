//! Tags for the Haystack bundle store.
//!
//! A tag is a named pointer from (bundle, tag name) to the digest of one of
//! the bundle's revisions. Tags are mutable: creating a tag that already
//! exists moves it (last write wins). A tag can only be pointed at a digest
//! the [`RevisionLedger`](haystack_ledger::RevisionLedger) knows about for
//! the same bundle; that check happens on every write.
//!
//! Tag names are validated by [`TagName::new`] and follow the same rules as
//! bundle names, since both end up as path components and index key names.
//!
//! # Modules
//!
//! - [`error`]: [`RefError`] and the [`Result`] alias
//! - [`tags`]: the [`TagIndex`]

pub mod error;
pub mod tags;

pub use error::{RefError, Result};
pub use haystack_types::TagName;
pub use tags::{TagIndex, TAG_KIND};
