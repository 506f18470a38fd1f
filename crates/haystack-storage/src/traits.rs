use async_trait::async_trait;
use haystack_store::ObjectStream;
use haystack_types::{Digest, Page, Revision, Tag};
use tokio::io::AsyncRead;

use crate::error::StorageResult;

/// Readable handle on a stored bundle. Dropping it releases the backend
/// resources behind it.
pub type BundleReader = ObjectStream;

/// The bundle store contract.
///
/// Every operation takes the already-authenticated caller identity first
/// and re-validates ownership of the bundle before doing anything else.
/// Inputs are raw caller strings; implementations validate them and report
/// malformed values as [`InvalidArgument`](crate::StorageError::InvalidArgument).
/// Cursors are opaque, URL-safe strings; the empty string means "from the
/// beginning" and a returned empty string means "no more pages".
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store the bytes read from `body` under `bundle` and return their
    /// digest. The first successful upload to a bundle makes the caller its
    /// owner.
    async fn save_bundle(
        &self,
        owner: &str,
        bundle: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<Digest>;

    /// Open the bytes of revision `digest`.
    async fn get_bundle(&self, owner: &str, bundle: &str, digest: &str)
        -> StorageResult<BundleReader>;

    /// One page of revisions, most recent first.
    async fn list_revisions(
        &self,
        owner: &str,
        bundle: &str,
        cursor: &str,
        page_size: i64,
    ) -> StorageResult<Page<Revision>>;

    /// Point `tag` at revision `digest`, creating or moving it.
    async fn create_tag(
        &self,
        owner: &str,
        bundle: &str,
        digest: &str,
        tag: &str,
    ) -> StorageResult<Tag>;

    /// The digest `tag` points at.
    async fn get_tag(&self, owner: &str, bundle: &str, tag: &str) -> StorageResult<Digest>;

    /// One page of tags, most recently created first.
    async fn list_tags(
        &self,
        owner: &str,
        bundle: &str,
        cursor: &str,
        page_size: i64,
    ) -> StorageResult<Page<Tag>>;

    /// Remove `tag`, returning the digest it pointed at.
    async fn delete_tag(&self, owner: &str, bundle: &str, tag: &str) -> StorageResult<Digest>;
}
