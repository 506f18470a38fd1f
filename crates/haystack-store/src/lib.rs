//! Object backend adapter for the Haystack bundle store.
//!
//! An object backend is a flat namespace of immutable blobs addressed by
//! slash-separated paths, analogous to a cloud storage bucket. Haystack uses
//! it for two kinds of objects: staged uploads and permanent, digest-keyed
//! bundle data (see [`layout`]).
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectBackend`] trait:
//!
//! - [`InMemoryObjectBackend`] -- `BTreeMap`-based backend for tests and embedding
//! - [`FsObjectBackend`] -- local filesystem backend with rename-based atomicity
//!
//! # Design Rules
//!
//! 1. An object is either absent or complete; readers never observe a
//!    partially written or partially copied object.
//! 2. `copy` has rename semantics at the destination.
//! 3. Listing is ordered lexicographically by path and resumable.
//! 4. The backend never interprets object contents.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod layout;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectBackend;
pub use layout::{revision_path, staging_path, staging_prefix, validate_path};
pub use memory::InMemoryObjectBackend;
pub use traits::{ListPage, ObjectBackend, ObjectEntry, ObjectStream};
