use std::sync::Arc;

use haystack_index::{Key, MetadataIndex, Row};
use haystack_ledger::{list_newest_first, RevisionLedger};
use haystack_types::{order_key, BundleName, Clock, Digest, Page, PageCursor, Tag, TagName};
use tracing::{debug, info};

use crate::error::{RefError, Result};

/// Index kind of [`Tag`] rows. The ancestor is the bundle name, the name is
/// the tag name, and the order key is the tag's creation time.
pub const TAG_KIND: &str = "Tag";

/// Maps (bundle, tag name) to a revision digest.
pub struct TagIndex {
    index: Arc<dyn MetadataIndex>,
    revisions: Arc<RevisionLedger>,
    clock: Arc<dyn Clock>,
}

impl TagIndex {
    pub fn new(
        index: Arc<dyn MetadataIndex>,
        revisions: Arc<RevisionLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            index,
            revisions,
            clock,
        }
    }

    fn key(bundle: &BundleName, tag: &TagName) -> Key {
        Key::child(TAG_KIND, bundle.as_str(), tag.as_str())
    }

    async fn find(&self, bundle: &BundleName, tag: &TagName) -> Result<Option<Tag>> {
        match self.index.get(&Self::key(bundle, tag)).await? {
            Some(row) => Ok(Some(row.decode()?)),
            None => Ok(None),
        }
    }

    /// Point `tag` at `digest`, creating or moving it.
    ///
    /// Fails with [`RefError::RevisionNotFound`] unless `digest` is a
    /// recorded revision of `bundle`. Re-creating a tag with the digest it
    /// already has keeps its creation time; moving it to another digest
    /// stamps a new one.
    pub async fn create(&self, bundle: &BundleName, tag: &TagName, digest: &Digest) -> Result<Tag> {
        if !self.revisions.exists(bundle, digest).await? {
            return Err(RefError::RevisionNotFound {
                bundle: bundle.clone(),
                digest: *digest,
            });
        }

        if let Some(existing) = self.find(bundle, tag).await? {
            if existing.digest == *digest {
                debug!(%bundle, %tag, "tag already points at digest");
                return Ok(existing);
            }
        }

        let record = Tag {
            bundle: bundle.clone(),
            name: tag.clone(),
            digest: *digest,
            created_at: self.clock.now(),
        };
        self.index
            .put(Row::encode(
                Self::key(bundle, tag),
                order_key(&record.created_at),
                &record,
            )?)
            .await?;
        info!(%bundle, %tag, digest = %digest.short_hex(), "tag set");
        Ok(record)
    }

    /// The tag record, or [`RefError::TagNotFound`].
    pub async fn resolve(&self, bundle: &BundleName, tag: &TagName) -> Result<Tag> {
        self.find(bundle, tag)
            .await?
            .ok_or_else(|| RefError::TagNotFound {
                bundle: bundle.clone(),
                tag: tag.clone(),
            })
    }

    /// Remove a tag, returning the record as it was before deletion.
    pub async fn delete(&self, bundle: &BundleName, tag: &TagName) -> Result<Tag> {
        let existing = self.resolve(bundle, tag).await?;
        if !self.index.delete(&Self::key(bundle, tag)).await? {
            // Deleted by someone else between the read and the delete.
            return Err(RefError::TagNotFound {
                bundle: bundle.clone(),
                tag: tag.clone(),
            });
        }
        info!(%bundle, %tag, digest = %existing.digest.short_hex(), "tag deleted");
        Ok(existing)
    }

    /// One page of `bundle`'s tags, most recently created first.
    pub async fn list(
        &self,
        bundle: &BundleName,
        cursor: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<Page<Tag>> {
        Ok(list_newest_first(self.index.as_ref(), TAG_KIND, bundle, cursor, page_size).await?)
    }
}

impl std::fmt::Debug for TagIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagIndex").finish_non_exhaustive()
    }
}
