//! Content-addressed bundle storage.
//!
//! This is the entry point for applications embedding Haystack. The
//! [`Storage`] trait is the whole contract: upload a bundle, fetch it by
//! digest, page through its revision history, and manage tags. Every call
//! carries the caller's identity; the first successful upload to a bundle
//! name makes that caller its owner, and every later call is checked
//! against it.
//!
//! [`BundleStore`] implements [`Storage`] on top of an
//! [`ObjectBackend`](haystack_store::ObjectBackend) for bundle bytes and a
//! [`MetadataIndex`](haystack_index::MetadataIndex) for owners, revisions
//! and tags.
//!
//! ```no_run
//! use haystack_storage::{BundleStore, Storage, StoreConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = BundleStore::open(&StoreConfig::load("haystack.toml")?).await?;
//! let mut body: &[u8] = b"PK\x03\x04...";
//! let digest = store.save_bundle("alice", "my-app", &mut body).await?;
//! store.create_tag("alice", "my-app", &digest.to_hex(), "live").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod store;
pub mod traits;

pub use config::{ConfigError, StoreConfig, DEFAULT_MAX_PAGE_SIZE};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use store::BundleStore;
pub use traits::{BundleReader, Storage};

// Re-export the types that appear in the Storage contract.
pub use haystack_types::{Digest, Page, PageCursor, Revision, Tag};
