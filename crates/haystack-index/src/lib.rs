//! Transactional metadata index for the Haystack bundle store.
//!
//! The index is a strongly consistent key/value table modelled on document
//! datastores: every row has a [`Key`] made of a kind, an optional ancestor
//! and a name, an ordering key, and an opaque bincode-encoded value.
//!
//! - Single-key `get` / `put` / `delete`
//! - Ancestor-scoped [`Query`] with ascending or descending order and opaque
//!   resumption positions
//! - Optimistic [`Transaction`]s: commit fails with
//!   [`IndexError::Conflict`] if anything read inside the transaction was
//!   changed by someone else before commit
//!
//! [`LocalIndex`] implements all of this in process, optionally persisting
//! the table to a snapshot file.

pub mod error;
pub mod local;
pub mod row;
pub mod traits;

pub use error::{IndexError, IndexResult};
pub use local::LocalIndex;
pub use row::{Key, Row};
pub use traits::{MetadataIndex, Query, QueryPage, SortOrder, Transaction};
