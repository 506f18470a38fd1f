use std::sync::Arc;

use async_trait::async_trait;
use haystack_crypto::HashingReader;
use haystack_index::{LocalIndex, MetadataIndex};
use haystack_ledger::{BundleRegistry, RevisionLedger, DEFAULT_REGISTRATION_ATTEMPTS};
use haystack_refs::TagIndex;
use haystack_store::{
    revision_path, staging_path, staging_prefix, FsObjectBackend, InMemoryObjectBackend,
    ObjectBackend,
};
use haystack_types::{
    BundleName, Clock, Digest, OwnerId, Page, PageCursor, Revision, SystemClock, Tag, TagName,
};
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{StoreConfig, DEFAULT_MAX_PAGE_SIZE};
use crate::error::{StorageError, StorageResult};
use crate::traits::{BundleReader, Storage};

/// Objects removed per listing page when sweeping staged uploads.
const STAGING_SWEEP_BATCH: usize = 100;

/// The production [`Storage`] implementation.
///
/// Composes an [`ObjectBackend`] for bundle bytes with a [`MetadataIndex`]
/// holding owners, revisions and tags.
pub struct BundleStore {
    objects: Arc<dyn ObjectBackend>,
    registry: BundleRegistry,
    revisions: Arc<RevisionLedger>,
    tags: TagIndex,
    max_page_size: usize,
}

impl BundleStore {
    /// A store over the given backends with default settings.
    pub fn new(objects: Arc<dyn ObjectBackend>, index: Arc<dyn MetadataIndex>) -> Self {
        Self::assemble(
            objects,
            index,
            Arc::new(SystemClock::new()),
            DEFAULT_REGISTRATION_ATTEMPTS,
            DEFAULT_MAX_PAGE_SIZE,
        )
    }

    /// Like [`new`](Self::new) with an explicit clock.
    pub fn with_clock(
        objects: Arc<dyn ObjectBackend>,
        index: Arc<dyn MetadataIndex>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::assemble(
            objects,
            index,
            clock,
            DEFAULT_REGISTRATION_ATTEMPTS,
            DEFAULT_MAX_PAGE_SIZE,
        )
    }

    /// A purely in-memory store.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryObjectBackend::new()),
            Arc::new(LocalIndex::in_memory()),
        )
    }

    /// Open the local production variant: a filesystem object backend under
    /// `data_dir` and a snapshot-persisted index.
    pub async fn open(config: &StoreConfig) -> StorageResult<Self> {
        config
            .validate()
            .map_err(|e| StorageError::InvalidArgument(e.to_string()))?;

        let mut objects = FsObjectBackend::open(&config.data_dir)
            .await
            .map_err(|e| StorageError::backend("opening object backend", e))?;
        if let Some(timeout) = config.io_timeout() {
            objects = objects.with_io_timeout(timeout);
        }
        let index = LocalIndex::open(config.index_path())
            .await
            .map_err(|e| StorageError::backend("opening metadata index", e))?;

        info!(data_dir = %config.data_dir.display(), "bundle store opened");
        Ok(Self::assemble(
            Arc::new(objects),
            Arc::new(index),
            Arc::new(SystemClock::new()),
            config.registration_attempts,
            config.max_page_size,
        ))
    }

    fn assemble(
        objects: Arc<dyn ObjectBackend>,
        index: Arc<dyn MetadataIndex>,
        clock: Arc<dyn Clock>,
        registration_attempts: usize,
        max_page_size: usize,
    ) -> Self {
        let registry = BundleRegistry::new(
            Arc::clone(&index),
            Arc::clone(&clock),
            registration_attempts,
        );
        let revisions = Arc::new(RevisionLedger::new(Arc::clone(&index), Arc::clone(&clock)));
        let tags = TagIndex::new(index, Arc::clone(&revisions), clock);
        Self {
            objects,
            registry,
            revisions,
            tags,
            max_page_size: max_page_size.max(1),
        }
    }

    /// Delete leftover staged uploads of `bundle`, returning how many were
    /// removed. A staged object is orphaned when the process stops between
    /// staging and promotion, or when deleting it after a failure did not go
    /// through. Uploads abandoned mid-stream never reach `uploading/`: the
    /// backend drops their partial data itself.
    pub async fn sweep_staging(&self, owner: &str, bundle: &str) -> StorageResult<usize> {
        let owner = OwnerId::new(owner)?;
        let bundle = BundleName::new(bundle)?;
        self.registry.check(&bundle, &owner).await?;

        let prefix = staging_prefix(&bundle);
        let mut removed = 0;
        let mut start: Option<String> = None;
        loop {
            let page = self
                .objects
                .list(&prefix, start.as_deref(), STAGING_SWEEP_BATCH)
                .await?;
            for entry in &page.entries {
                if self.objects.delete(&entry.path).await? {
                    removed += 1;
                }
            }
            match page.next {
                Some(next) => start = Some(next),
                None => break,
            }
        }

        if removed > 0 {
            info!(%bundle, removed, "swept staged uploads");
        }
        Ok(removed)
    }

    fn page_size(&self, requested: i64) -> StorageResult<usize> {
        match usize::try_from(requested) {
            Ok(size) if (1..=self.max_page_size).contains(&size) => Ok(size),
            _ => Err(StorageError::InvalidArgument(format!(
                "page size must be between 1 and {}, got {requested}",
                self.max_page_size
            ))),
        }
    }

    async fn discard_staging(&self, path: &str) {
        if let Err(e) = self.objects.delete(path).await {
            warn!(path, error = %e, "failed to remove staged upload");
        }
    }

    /// Stream `body` into a fresh staging object, returning the staging path
    /// and the digest of exactly the bytes written there.
    async fn stage(
        &self,
        bundle: &BundleName,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<(String, Digest)> {
        let staging = staging_path(bundle, &Uuid::now_v7());
        let mut reader = HashingReader::new(body);

        let written = self.objects.put(&staging, &mut reader).await;
        match written {
            Ok(written) => {
                let digest = reader.finalize();
                debug!(%bundle, bytes = written, digest = %digest.short_hex(), "upload staged");
                Ok((staging, digest))
            }
            Err(e) => {
                self.discard_staging(&staging).await;
                Err(StorageError::backend("staging upload", e))
            }
        }
    }

    /// Move a staged upload to its permanent, digest-keyed path.
    async fn promote(&self, staging: &str, bundle: &BundleName, digest: &Digest) -> StorageResult<()> {
        let permanent = revision_path(bundle, digest);
        if self.objects.exists(&permanent).await? {
            debug!(%bundle, digest = %digest.short_hex(), "content already stored");
        } else {
            self.objects
                .copy(staging, &permanent)
                .await
                .map_err(|e| StorageError::backend("promoting upload", e))?;
            debug!(%bundle, digest = %digest.short_hex(), "upload promoted");
        }
        self.discard_staging(staging).await;
        Ok(())
    }
}

impl std::fmt::Debug for BundleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleStore")
            .field("registry", &self.registry)
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

fn parse_cursor(token: &str) -> StorageResult<Option<PageCursor>> {
    if token.is_empty() {
        return Ok(None);
    }
    Ok(Some(PageCursor::decode(token)?))
}

/// A digest the caller supplied. Anything that is not a well-formed digest
/// cannot name a stored revision.
fn parse_digest(bundle: &BundleName, digest: &str) -> StorageResult<Digest> {
    Digest::from_hex(digest).map_err(|_| StorageError::RevisionNotFound {
        bundle: bundle.to_string(),
        digest: digest.to_string(),
    })
}

#[async_trait]
impl Storage for BundleStore {
    async fn save_bundle(
        &self,
        owner: &str,
        bundle: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<Digest> {
        let owner = OwnerId::new(owner)?;
        let bundle = BundleName::new(bundle)?;

        // Refuse early so a foreign owner never gets to stream bytes in.
        self.registry.check(&bundle, &owner).await?;

        let (staging, digest) = self.stage(&bundle, body).await?;

        // Nothing becomes visible under the bundle until registration has
        // been won, so a losing concurrent first upload leaves no trace.
        if let Err(e) = self.registry.claim(&bundle, &owner).await {
            self.discard_staging(&staging).await;
            return Err(e.into());
        }

        if let Err(e) = self.promote(&staging, &bundle, &digest).await {
            self.discard_staging(&staging).await;
            return Err(e);
        }

        let revision = self.revisions.record(&bundle, &digest).await?;
        info!(
            %bundle,
            digest = %digest.short_hex(),
            created_at = %revision.created_at,
            "bundle saved"
        );
        Ok(digest)
    }

    async fn get_bundle(
        &self,
        owner: &str,
        bundle: &str,
        digest: &str,
    ) -> StorageResult<BundleReader> {
        let owner = OwnerId::new(owner)?;
        let bundle = BundleName::new(bundle)?;
        self.registry.check(&bundle, &owner).await?;
        let parsed = parse_digest(&bundle, digest)?;

        self.objects
            .get(&revision_path(&bundle, &parsed))
            .await?
            .ok_or_else(|| StorageError::RevisionNotFound {
                bundle: bundle.to_string(),
                digest: digest.to_string(),
            })
    }

    async fn list_revisions(
        &self,
        owner: &str,
        bundle: &str,
        cursor: &str,
        page_size: i64,
    ) -> StorageResult<Page<Revision>> {
        let owner = OwnerId::new(owner)?;
        let bundle = BundleName::new(bundle)?;
        let page_size = self.page_size(page_size)?;
        let cursor = parse_cursor(cursor)?;
        self.registry.check(&bundle, &owner).await?;

        Ok(self.revisions.list(&bundle, cursor.as_ref(), page_size).await?)
    }

    async fn create_tag(
        &self,
        owner: &str,
        bundle: &str,
        digest: &str,
        tag: &str,
    ) -> StorageResult<Tag> {
        let owner = OwnerId::new(owner)?;
        let bundle = BundleName::new(bundle)?;
        let tag = TagName::new(tag)?;
        self.registry.check(&bundle, &owner).await?;
        let digest = parse_digest(&bundle, digest)?;

        Ok(self.tags.create(&bundle, &tag, &digest).await?)
    }

    async fn get_tag(&self, owner: &str, bundle: &str, tag: &str) -> StorageResult<Digest> {
        let owner = OwnerId::new(owner)?;
        let bundle = BundleName::new(bundle)?;
        let tag = TagName::new(tag)?;
        self.registry.check(&bundle, &owner).await?;

        Ok(self.tags.resolve(&bundle, &tag).await?.digest)
    }

    async fn list_tags(
        &self,
        owner: &str,
        bundle: &str,
        cursor: &str,
        page_size: i64,
    ) -> StorageResult<Page<Tag>> {
        let owner = OwnerId::new(owner)?;
        let bundle = BundleName::new(bundle)?;
        let page_size = self.page_size(page_size)?;
        let cursor = parse_cursor(cursor)?;
        self.registry.check(&bundle, &owner).await?;

        Ok(self.tags.list(&bundle, cursor.as_ref(), page_size).await?)
    }

    async fn delete_tag(&self, owner: &str, bundle: &str, tag: &str) -> StorageResult<Digest> {
        let owner = OwnerId::new(owner)?;
        let bundle = BundleName::new(bundle)?;
        let tag = TagName::new(tag)?;
        self.registry.check(&bundle, &owner).await?;

        Ok(self.tags.delete(&bundle, &tag).await?.digest)
    }
}
