//! Digest engine for the Haystack bundle store.
//!
//! Bundles are addressed by the SHA-512 digest of their bytes. The digest is
//! computed while the upload streams through to the object backend, so the
//! bytes hashed and the bytes stored are the same bytes, read once.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod reader;

pub use hasher::ContentHasher;
pub use reader::HashingReader;
