use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::StoreResult;

/// Streaming handle to an object's bytes. Dropping it releases the handle.
pub type ObjectStream = Pin<Box<dyn AsyncRead + Send>>;

/// One object reported by [`ObjectBackend::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    pub path: String,
    pub size: u64,
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    /// Opaque position to resume from, present when the page was full.
    pub next: Option<String>,
}

/// Append-only blob namespace.
///
/// All implementations must satisfy these invariants:
/// - An object is either absent or complete. `put` and `copy` never expose
///   a partially written object at the target path.
/// - `copy` has rename semantics at the destination: the destination is
///   replaced in a single step.
/// - `list` returns paths in lexicographic order and resumes strictly after
///   the given position.
/// - Timeouts and cancellations surface as errors, never as hangs.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Write `body` to `path`, replacing any existing object. Returns the
    /// number of bytes written.
    async fn put(&self, path: &str, body: &mut (dyn AsyncRead + Send + Unpin)) -> StoreResult<u64>;

    /// Open an object for reading.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    async fn get(&self, path: &str) -> StoreResult<Option<ObjectStream>>;

    /// Check whether an object exists.
    async fn exists(&self, path: &str) -> StoreResult<bool>;

    /// Atomically copy `src` to `dst`.
    ///
    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) when
    /// `src` does not exist.
    async fn copy(&self, src: &str, dst: &str) -> StoreResult<()>;

    /// Delete an object. Returns `true` if the object existed.
    async fn delete(&self, path: &str) -> StoreResult<bool>;

    /// List up to `limit` objects whose path starts with `prefix`, resuming
    /// after the opaque `start` position from a previous page.
    async fn list(&self, prefix: &str, start: Option<&str>, limit: usize) -> StoreResult<ListPage>;
}

/// Encode a list position from the last path returned.
pub(crate) fn encode_position(path: &str) -> String {
    hex::encode(path)
}

/// Decode a list position back into the path to resume after.
pub(crate) fn decode_position(position: &str) -> StoreResult<String> {
    let bytes = hex::decode(position)
        .map_err(|e| crate::error::StoreError::InvalidPosition(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| crate::error::StoreError::InvalidPosition(e.to_string()))
}

/// Build a page from sorted candidates, honoring `limit`.
pub(crate) fn paginate(sorted: impl Iterator<Item = ObjectEntry>, limit: usize) -> ListPage {
    let entries: Vec<ObjectEntry> = sorted.take(limit).collect();
    let next = if limit > 0 && entries.len() == limit {
        entries.last().map(|e| encode_position(&e.path))
    } else {
        None
    };
    ListPage { entries, next }
}
