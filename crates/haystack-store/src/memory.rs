use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{StoreError, StoreResult};
use crate::layout::validate_path;
use crate::traits::{decode_position, paginate, ListPage, ObjectBackend, ObjectEntry, ObjectStream};

/// In-memory, `BTreeMap`-based object backend.
///
/// Intended for tests and embedding. Uploads are buffered completely before
/// they are inserted, so a failed or abandoned `put` leaves nothing behind.
/// Object bytes are reference counted and shared with readers.
pub struct InMemoryObjectBackend {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl InMemoryObjectBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the backend holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Sorted list of every stored path.
    pub fn all_paths(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for InMemoryObjectBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectBackend for InMemoryObjectBackend {
    async fn put(&self, path: &str, body: &mut (dyn AsyncRead + Send + Unpin)) -> StoreResult<u64> {
        validate_path(path)?;
        let mut buf = Vec::new();
        let written = body.read_to_end(&mut buf).await? as u64;
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(path.to_string(), Bytes::from(buf));
        Ok(written)
    }

    async fn get(&self, path: &str) -> StoreResult<Option<ObjectStream>> {
        validate_path(path)?;
        let data = self.objects.read().expect("lock poisoned").get(path).cloned();
        Ok(data.map(|bytes| Box::pin(std::io::Cursor::new(bytes)) as ObjectStream))
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        validate_path(path)?;
        Ok(self.objects.read().expect("lock poisoned").contains_key(path))
    }

    async fn copy(&self, src: &str, dst: &str) -> StoreResult<()> {
        validate_path(src)?;
        validate_path(dst)?;
        let mut map = self.objects.write().expect("lock poisoned");
        let data = map
            .get(src)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(src.to_string()))?;
        map.insert(dst.to_string(), data);
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<bool> {
        validate_path(path)?;
        Ok(self.objects.write().expect("lock poisoned").remove(path).is_some())
    }

    async fn list(&self, prefix: &str, start: Option<&str>, limit: usize) -> StoreResult<ListPage> {
        let after = start.map(decode_position).transpose()?;
        let lower = match &after {
            Some(path) if path.as_str() >= prefix => Bound::Excluded(path.clone()),
            _ => Bound::Included(prefix.to_string()),
        };

        let map = self.objects.read().expect("lock poisoned");
        let candidates = map
            .range((lower, Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, data)| ObjectEntry {
                path: path.clone(),
                size: data.len() as u64,
            });
        Ok(paginate(candidates, limit))
    }
}

impl std::fmt::Debug for InMemoryObjectBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectBackend")
            .field("object_count", &self.len())
            .finish()
    }
}
