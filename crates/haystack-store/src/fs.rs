//! Local filesystem object backend.
//!
//! On-disk layout:
//! ```text
//! {root}/objects/{path}        committed objects
//! {root}/tmp/{uuid}.partial    in-flight writes and copies
//! ```
//!
//! Every write lands in `tmp/` first and is renamed into `objects/` once
//! complete. Both directories live under the same root, so the rename stays
//! on one filesystem and is atomic.
//!
//! A partial file is removed as soon as its write fails or its future is
//! dropped. Files left by a crashed process are removed by
//! [`FsObjectBackend::open`], which assumes it is the only process using
//! `root`.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::layout::validate_path;
use crate::traits::{decode_position, paginate, ListPage, ObjectBackend, ObjectEntry, ObjectStream};

/// Object backend rooted at a local directory.
#[derive(Clone, Debug)]
pub struct FsObjectBackend {
    objects_dir: PathBuf,
    tmp_dir: PathBuf,
    io_timeout: Option<Duration>,
}

impl FsObjectBackend {
    /// Open (or create) a backend rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        let objects_dir = root.join("objects");
        let tmp_dir = root.join("tmp");
        tokio::fs::create_dir_all(&objects_dir).await?;
        tokio::fs::create_dir_all(&tmp_dir).await?;
        let swept = sweep_partial_files(&tmp_dir).await?;
        if swept > 0 {
            warn!(root = %root.display(), swept, "removed partial files left by an earlier run");
        }
        debug!(root = %root.display(), "opened filesystem object backend");
        Ok(Self {
            objects_dir,
            tmp_dir,
            io_timeout: None,
        })
    }

    /// Bound every filesystem call except streaming uploads by `timeout`.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    fn resolve(&self, path: &str) -> StoreResult<PathBuf> {
        validate_path(path)?;
        Ok(self.objects_dir.join(path))
    }

    fn temp_file(&self) -> PartialFile {
        PartialFile {
            path: self.tmp_dir.join(format!("{}.partial", Uuid::now_v7())),
            committed: false,
        }
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        path: &str,
        fut: impl Future<Output = io::Result<T>>,
    ) -> StoreResult<T> {
        match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| StoreError::Timeout {
                    operation,
                    path: path.to_string(),
                })?
                .map_err(StoreError::from),
            None => fut.await.map_err(StoreError::from),
        }
    }

    /// Move a finished temp file into place, creating parent directories.
    async fn commit(&self, temp: &mut PartialFile, target: &Path) -> io::Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&temp.path, target).await?;
        temp.committed = true;
        Ok(())
    }
}

/// A file under `tmp/` that is deleted on drop unless it was committed.
///
/// Removal happens synchronously in `Drop` so that a cancelled upload cleans
/// up even though no further `.await` runs.
#[derive(Debug)]
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove partial file");
            }
        }
    }
}

/// Delete every leftover entry in `tmp_dir`, returning how many were removed.
async fn sweep_partial_files(tmp_dir: &Path) -> io::Result<usize> {
    let mut swept = 0;
    let mut entries = tokio::fs::read_dir(tmp_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => swept += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(swept)
}

#[async_trait]
impl ObjectBackend for FsObjectBackend {
    async fn put(&self, path: &str, body: &mut (dyn AsyncRead + Send + Unpin)) -> StoreResult<u64> {
        let target = self.resolve(path)?;
        let mut temp = self.temp_file();

        let mut file = tokio::fs::File::create(&temp.path).await?;
        let written = tokio::io::copy(body, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        self.commit(&mut temp, &target).await?;

        debug!(path, bytes = written, "object written");
        Ok(written)
    }

    async fn get(&self, path: &str) -> StoreResult<Option<ObjectStream>> {
        let target = self.resolve(path)?;
        match self.timed("get", path, tokio::fs::File::open(&target)).await {
            Ok(file) => Ok(Some(Box::pin(file))),
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        let target = self.resolve(path)?;
        self.timed("exists", path, tokio::fs::try_exists(&target)).await
    }

    async fn copy(&self, src: &str, dst: &str) -> StoreResult<()> {
        let source = self.resolve(src)?;
        let target = self.resolve(dst)?;
        let mut temp = self.temp_file();

        let copied = self
            .timed("copy", src, async {
                tokio::fs::copy(&source, &temp.path).await?;
                self.commit(&mut temp, &target).await
            })
            .await;

        match copied {
            Ok(()) => Ok(()),
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(src.to_string()))
            }
            Err(other) => Err(other),
        }
    }

    async fn delete(&self, path: &str) -> StoreResult<bool> {
        let target = self.resolve(path)?;
        match self.timed("delete", path, tokio::fs::remove_file(&target)).await {
            Ok(()) => Ok(true),
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, prefix: &str, start: Option<&str>, limit: usize) -> StoreResult<ListPage> {
        let after = start.map(decode_position).transpose()?;
        let objects_dir = self.objects_dir.clone();
        let prefix_owned = prefix.to_string();

        let walk = tokio::task::spawn_blocking(move || scan(&objects_dir, &prefix_owned, after));
        let mut entries = self
            .timed("list", prefix, async {
                walk.await.map_err(io::Error::other)?
            })
            .await?;

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(paginate(entries.into_iter(), limit))
    }
}

/// Collect every committed object under `prefix` that sorts after `after`.
fn scan(objects_dir: &Path, prefix: &str, after: Option<String>) -> io::Result<Vec<ObjectEntry>> {
    // Only walk the deepest directory the prefix pins down.
    let walk_root = match prefix.rfind('/') {
        Some(idx) => objects_dir.join(&prefix[..idx]),
        None => objects_dir.to_path_buf(),
    };
    if !walk_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(&walk_root).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(objects_dir) else {
            continue;
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !path.starts_with(prefix) {
            continue;
        }
        if after.as_deref().is_some_and(|after| path.as_str() <= after) {
            continue;
        }
        let size = entry.metadata().map_err(io::Error::other)?.len();
        entries.push(ObjectEntry { path, size });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn backend() -> (tempfile::TempDir, FsObjectBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsObjectBackend::open(dir.path()).await.unwrap();
        (dir, backend)
    }

    async fn put_bytes(backend: &FsObjectBackend, path: &str, data: &[u8]) -> u64 {
        let mut body = data;
        backend.put(path, &mut body).await.unwrap()
    }

    async fn read_all(backend: &FsObjectBackend, path: &str) -> Vec<u8> {
        let mut stream = backend.get(path).await.unwrap().expect("should exist");
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    fn temp_files(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path().join("tmp")).unwrap().count()
    }

    #[tokio::test]
    async fn put_and_get_roundtrip() {
        let (_dir, backend) = backend().await;
        let data: Vec<u8> = (0..70_000u32).map(|i| i as u8).collect();
        assert_eq!(put_bytes(&backend, "app/uploading/1", &data).await, data.len() as u64);
        assert_eq!(read_all(&backend, "app/uploading/1").await, data);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let (_dir, backend) = backend().await;
        assert!(backend.get("app/missing").await.unwrap().is_none());
        assert!(!backend.exists("app/missing").await.unwrap());
    }

    #[tokio::test]
    async fn copy_is_complete_and_leaves_no_temp_files() {
        let (dir, backend) = backend().await;
        put_bytes(&backend, "app/uploading/1", b"bundle bytes").await;

        backend
            .copy("app/uploading/1", "app/revision-data/abc")
            .await
            .unwrap();
        assert!(backend.delete("app/uploading/1").await.unwrap());

        assert_eq!(read_all(&backend, "app/revision-data/abc").await, b"bundle bytes");
        assert_eq!(temp_files(&dir), 0);
    }

    #[tokio::test]
    async fn copy_missing_source_is_not_found() {
        let (dir, backend) = backend().await;
        let err = backend.copy("app/nope", "app/dst").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(p) if p == "app/nope"));
        assert!(!backend.exists("app/dst").await.unwrap());
        assert_eq!(temp_files(&dir), 0);
    }

    #[tokio::test]
    async fn failed_upload_leaves_nothing_behind() {
        struct Broken;
        impl AsyncRead for Broken {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
            }
        }

        let (dir, backend) = backend().await;
        let mut body = Broken;
        assert!(backend.put("app/uploading/x", &mut body).await.is_err());
        assert!(!backend.exists("app/uploading/x").await.unwrap());
        assert_eq!(temp_files(&dir), 0);
    }

    /// Yields one chunk, then never makes progress again.
    struct Stalled {
        sent: bool,
    }

    impl AsyncRead for Stalled {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            if self.sent {
                return std::task::Poll::Pending;
            }
            self.sent = true;
            buf.put_slice(&[7u8; 4096]);
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn cancelled_upload_removes_its_partial_file() {
        let (dir, backend) = backend().await;
        let mut body = Stalled { sent: false };

        let cancelled = tokio::time::timeout(
            Duration::from_millis(100),
            backend.put("app/uploading/x", &mut body),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(body.sent);
        assert_eq!(temp_files(&dir), 0);
        assert!(!backend.exists("app/uploading/x").await.unwrap());
    }

    #[tokio::test]
    async fn open_removes_partial_files_from_a_crashed_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
        std::fs::write(dir.path().join("tmp/stale-1.partial"), b"half").unwrap();
        std::fs::write(dir.path().join("tmp/stale-2.partial"), b"half").unwrap();

        let backend = FsObjectBackend::open(dir.path()).await.unwrap();
        assert_eq!(temp_files(&dir), 0);
        put_bytes(&backend, "a/b", b"x").await;
        assert!(backend.exists("a/b").await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (_dir, backend) = backend().await;
        put_bytes(&backend, "a/b", b"x").await;
        assert!(backend.delete("a/b").await.unwrap());
        assert!(!backend.delete("a/b").await.unwrap());
    }

    #[tokio::test]
    async fn list_orders_and_paginates() {
        let (_dir, backend) = backend().await;
        for path in ["app/r/3", "app/r/1", "app/r/2", "app/other/1", "apple/r/1"] {
            put_bytes(&backend, path, b"xy").await;
        }

        let first = backend.list("app/r/", None, 2).await.unwrap();
        let paths: Vec<_> = first.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["app/r/1", "app/r/2"]);
        assert_eq!(first.entries[0].size, 2);

        let second = backend
            .list("app/r/", first.next.as_deref(), 2)
            .await
            .unwrap();
        let paths: Vec<_> = second.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["app/r/3"]);
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn list_of_missing_prefix_is_empty() {
        let (_dir, backend) = backend().await;
        let page = backend.list("nothing/here/", None, 10).await.unwrap();
        assert!(page.entries.is_empty());
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let (_dir, backend) = backend().await;
        assert!(matches!(
            backend.get("../outside").await,
            Err(StoreError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let (_dir, backend) = backend().await;
        let backend = backend.with_io_timeout(Duration::from_millis(10));
        let err = backend
            .timed("copy", "app/uploading/x", std::future::pending::<io::Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Timeout { operation: "copy", ref path } if path == "app/uploading/x"
        ));
    }

    #[tokio::test]
    async fn timeout_is_configurable() {
        let (_dir, backend) = backend().await;
        let backend = backend.with_io_timeout(Duration::from_secs(5));
        put_bytes(&backend, "a/b", b"x").await;
        assert!(backend.exists("a/b").await.unwrap());
    }
}
