//! In-process implementation of [`MetadataIndex`].
//!
//! [`LocalIndex`] keeps the whole table in a `BTreeMap` behind a
//! `tokio::sync::RwLock`. Every row carries a version number that is bumped
//! on each change; transactions remember the versions they read and commit
//! only if those versions are unchanged (compare-and-set).
//!
//! A second ordered set of slots mirrors the table sorted by scope and
//! then `(order_key, name)`, so a query seeks straight to its start position
//! and reads only the rows it returns.
//!
//! When opened with a snapshot path, every mutation rewrites the snapshot
//! (bincode, written to a temp file then renamed over the old one) before
//! the new state becomes visible.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::row::{Key, Row};
use crate::traits::{MetadataIndex, Position, Query, QueryPage, SortOrder, Transaction};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredRow {
    order_key: String,
    value: Vec<u8>,
    version: u64,
}

/// Position of a row in query order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    kind: String,
    ancestor: Option<String>,
    order_key: String,
    name: String,
}

impl Slot {
    fn of(key: &Key, order_key: &str) -> Self {
        Self {
            kind: key.kind.clone(),
            ancestor: key.ancestor.clone(),
            order_key: order_key.to_string(),
            name: key.name.clone(),
        }
    }

    fn at(query: &Query, position: Position) -> Self {
        Self {
            kind: query.kind.clone(),
            ancestor: Some(query.ancestor.clone()),
            order_key: position.order_key,
            name: position.name,
        }
    }

    /// Sorts before every slot in the query's scope.
    fn floor(query: &Query) -> Self {
        Self::at(query, Position::default())
    }

    /// Sorts after every slot in the query's scope and before the next scope.
    fn ceiling(query: &Query) -> Self {
        Self {
            kind: query.kind.clone(),
            ancestor: Some(format!("{}\0", query.ancestor)),
            order_key: String::new(),
            name: String::new(),
        }
    }

    fn key(&self) -> Key {
        Key {
            kind: self.kind.clone(),
            ancestor: self.ancestor.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct IndexState {
    rows: BTreeMap<Key, StoredRow>,
    /// Highest version handed out so far.
    clock: u64,
    /// Query order over `rows`; rebuilt on load.
    #[serde(skip)]
    ordered: BTreeSet<Slot>,
}

impl IndexState {
    fn reindex(mut self) -> Self {
        self.ordered = self
            .rows
            .iter()
            .map(|(key, stored)| Slot::of(key, &stored.order_key))
            .collect();
        self
    }

    fn row(&self, key: &Key) -> Option<Row> {
        self.rows.get(key).map(|stored| Row {
            key: key.clone(),
            order_key: stored.order_key.clone(),
            value: stored.value.clone(),
        })
    }

    fn version(&self, key: &Key) -> Option<u64> {
        self.rows.get(key).map(|stored| stored.version)
    }

    fn insert(&mut self, row: Row) {
        self.clock += 1;
        if let Some(previous) = self.rows.get(&row.key) {
            self.ordered.remove(&Slot::of(&row.key, &previous.order_key));
        }
        self.ordered.insert(Slot::of(&row.key, &row.order_key));
        self.rows.insert(
            row.key,
            StoredRow {
                order_key: row.order_key,
                value: row.value,
                version: self.clock,
            },
        );
    }

    fn remove(&mut self, key: &Key) -> bool {
        match self.rows.remove(key) {
            Some(stored) => {
                self.ordered.remove(&Slot::of(key, &stored.order_key));
                self.clock += 1;
                true
            }
            None => false,
        }
    }
}

struct Shared {
    state: RwLock<IndexState>,
    snapshot: Option<PathBuf>,
}

impl Shared {
    /// Apply `mutate` to a copy of the state, persist it, then publish it.
    async fn mutate<T>(&self, mutate: impl FnOnce(&mut IndexState) -> IndexResult<T>) -> IndexResult<T> {
        let mut guard = self.state.write().await;
        match &self.snapshot {
            None => mutate(&mut *guard),
            Some(path) => {
                let mut next = guard.clone();
                let out = mutate(&mut next)?;
                write_snapshot(path, &next).await?;
                *guard = next;
                Ok(out)
            }
        }
    }
}

async fn write_snapshot(path: &Path, state: &IndexState) -> IndexResult<()> {
    let bytes = bincode::serialize(state).map_err(|e| IndexError::Serialization(e.to_string()))?;
    let temp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&temp).await?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&temp, path).await?;
    Ok(())
}

/// In-process metadata index, optionally persisted to a snapshot file.
#[derive(Clone)]
pub struct LocalIndex {
    shared: Arc<Shared>,
}

impl LocalIndex {
    /// A purely in-memory index. Data is lost when the last handle is dropped.
    pub fn in_memory() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(IndexState::default()),
                snapshot: None,
            }),
        }
    }

    /// Open (or create) an index persisted at `path`.
    pub async fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => bincode::deserialize::<IndexState>(&bytes)
                .map_err(|e| IndexError::CorruptSnapshot(e.to_string()))?
                .reindex(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexState::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), rows = state.rows.len(), "opened index snapshot");

        Ok(Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                snapshot: Some(path),
            }),
        })
    }

    /// Number of rows currently stored.
    pub async fn len(&self) -> usize {
        self.shared.state.read().await.rows.len()
    }

    /// Returns `true` if the index holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for LocalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIndex")
            .field("snapshot", &self.shared.snapshot)
            .finish()
    }
}

#[async_trait]
impl MetadataIndex for LocalIndex {
    async fn get(&self, key: &Key) -> IndexResult<Option<Row>> {
        Ok(self.shared.state.read().await.row(key))
    }

    async fn put(&self, row: Row) -> IndexResult<()> {
        self.shared
            .mutate(|state| {
                state.insert(row);
                Ok(())
            })
            .await
    }

    async fn delete(&self, key: &Key) -> IndexResult<bool> {
        if self.shared.state.read().await.rows.get(key).is_none() {
            return Ok(false);
        }
        self.shared
            .mutate(|state| Ok(state.remove(key)))
            .await
    }

    async fn query(&self, query: &Query) -> IndexResult<QueryPage> {
        let start = query.start.as_deref().map(Position::decode).transpose()?;
        if query.limit == 0 {
            return Ok(QueryPage::default());
        }

        let state = self.shared.state.read().await;
        let slots: Box<dyn Iterator<Item = &Slot> + '_> = match query.order {
            SortOrder::Ascending => {
                let lower = match start {
                    Some(position) => Bound::Excluded(Slot::at(query, position)),
                    None => Bound::Included(Slot::floor(query)),
                };
                Box::new(state.ordered.range((lower, Bound::Excluded(Slot::ceiling(query)))))
            }
            SortOrder::Descending => {
                let upper = match start {
                    Some(position) => Slot::at(query, position),
                    None => Slot::ceiling(query),
                };
                Box::new(
                    state
                        .ordered
                        .range((Bound::Included(Slot::floor(query)), Bound::Excluded(upper)))
                        .rev(),
                )
            }
        };

        let rows: Vec<Row> = slots
            .filter_map(|slot| state.row(&slot.key()))
            .take(query.limit)
            .collect();
        drop(state);

        let end = rows.last().map(|row| Position::of(row).encode());
        Ok(QueryPage { rows, end })
    }

    async fn begin(&self) -> IndexResult<Box<dyn Transaction>> {
        Ok(Box::new(LocalTransaction {
            shared: Arc::clone(&self.shared),
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }))
    }
}

/// Transaction over a [`LocalIndex`].
struct LocalTransaction {
    shared: Arc<Shared>,
    /// Version observed for every key read; `None` means "was absent".
    reads: HashMap<Key, Option<u64>>,
    writes: BTreeMap<Key, Row>,
}

#[async_trait]
impl Transaction for LocalTransaction {
    async fn get(&mut self, key: &Key) -> IndexResult<Option<Row>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(Some(pending.clone()));
        }
        let state = self.shared.state.read().await;
        let observed = state.version(key);
        let row = state.row(key);
        drop(state);
        // Keep the first observation; later reads must not mask a change.
        self.reads.entry(key.clone()).or_insert(observed);
        Ok(row)
    }

    fn put(&mut self, row: Row) {
        self.writes.insert(row.key.clone(), row);
    }

    async fn commit(self: Box<Self>) -> IndexResult<()> {
        let LocalTransaction {
            shared,
            reads,
            writes,
        } = *self;

        shared
            .mutate(move |state| {
                for (key, observed) in &reads {
                    if state.version(key) != *observed {
                        return Err(IndexError::Conflict);
                    }
                }
                for row in writes.into_values() {
                    state.insert(row);
                }
                Ok(())
            })
            .await
    }
}
