//! Time-ordered revision history.
//!
//! Each bundle keeps one [`Revision`] row per distinct digest, stored under
//! the bundle as ancestor and ordered by creation time. Recording a digest
//! that is already present is a no-op: the original row and its timestamp
//! are kept.

use std::sync::Arc;

use haystack_index::{IndexError, Key, MetadataIndex, Row};
use haystack_types::{order_key, BundleName, Clock, Digest, Page, PageCursor, Revision};
use tracing::{debug, info};

use crate::error::LedgerResult;
use crate::paging::list_newest_first;

/// Index kind of [`Revision`] rows.
pub const REVISION_KIND: &str = "Revision";

pub struct RevisionLedger {
    index: Arc<dyn MetadataIndex>,
    clock: Arc<dyn Clock>,
}

impl RevisionLedger {
    pub fn new(index: Arc<dyn MetadataIndex>, clock: Arc<dyn Clock>) -> Self {
        Self { index, clock }
    }

    fn key(bundle: &BundleName, digest: &Digest) -> Key {
        Key::child(REVISION_KIND, bundle.as_str(), digest.to_hex())
    }

    /// Record a completed upload. Returns the canonical revision row, which
    /// is the existing one if `digest` was uploaded to `bundle` before.
    pub async fn record(&self, bundle: &BundleName, digest: &Digest) -> LedgerResult<Revision> {
        let key = Self::key(bundle, digest);

        let mut tx = self.index.begin().await?;
        if let Some(row) = tx.get(&key).await? {
            debug!(%bundle, digest = %digest.short_hex(), "revision already recorded");
            return Ok(row.decode()?);
        }

        let revision = Revision {
            bundle: bundle.clone(),
            digest: *digest,
            created_at: self.clock.now(),
        };
        tx.put(Row::encode(key.clone(), order_key(&revision.created_at), &revision)?);

        match tx.commit().await {
            Ok(()) => {
                info!(%bundle, digest = %digest.short_hex(), "revision recorded");
                Ok(revision)
            }
            // A concurrent upload of the same bytes got there first.
            Err(IndexError::Conflict) => match self.index.get(&key).await? {
                Some(row) => Ok(row.decode()?),
                None => Err(IndexError::Conflict.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Look up one revision.
    pub async fn get(&self, bundle: &BundleName, digest: &Digest) -> LedgerResult<Option<Revision>> {
        match self.index.get(&Self::key(bundle, digest)).await? {
            Some(row) => Ok(Some(row.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, bundle: &BundleName, digest: &Digest) -> LedgerResult<bool> {
        Ok(self.index.get(&Self::key(bundle, digest)).await?.is_some())
    }

    /// One page of `bundle`'s revisions, most recent first.
    pub async fn list(
        &self,
        bundle: &BundleName,
        cursor: Option<&PageCursor>,
        page_size: usize,
    ) -> LedgerResult<Page<Revision>> {
        list_newest_first(self.index.as_ref(), REVISION_KIND, bundle, cursor, page_size).await
    }
}

impl std::fmt::Debug for RevisionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionLedger").finish_non_exhaustive()
    }
}
