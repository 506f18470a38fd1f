use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::row::{Key, Row};

/// Direction of a query over `(order_key, name)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Ancestor-scoped query over one kind of row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub kind: String,
    pub ancestor: String,
    pub order: SortOrder,
    pub limit: usize,
    /// Opaque position from a previous [`QueryPage::end`]; results start
    /// strictly after it.
    pub start: Option<String>,
}

impl Query {
    pub fn new(kind: impl Into<String>, ancestor: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ancestor: ancestor.into(),
            order: SortOrder::Ascending,
            limit: usize::MAX,
            start: None,
        }
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn start_after(mut self, position: Option<String>) -> Self {
        self.start = position;
        self
    }
}

/// Result of a [`Query`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryPage {
    pub rows: Vec<Row>,
    /// Position of the last row returned, if any row was returned.
    pub end: Option<String>,
}

/// A point in the `(order_key, name)` ordering.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) struct Position {
    pub order_key: String,
    pub name: String,
}

impl Position {
    pub(crate) fn of(row: &Row) -> Self {
        Self {
            order_key: row.order_key.clone(),
            name: row.key.name.clone(),
        }
    }

    pub(crate) fn encode(&self) -> String {
        hex::encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub(crate) fn decode(token: &str) -> IndexResult<Self> {
        let json = hex::decode(token).map_err(|e| IndexError::MalformedPosition(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| IndexError::MalformedPosition(e.to_string()))
    }
}

/// An optimistic transaction.
///
/// Reads go to the committed table (or to this transaction's own pending
/// writes). Writes are buffered until [`commit`](Transaction::commit), which
/// applies them all at once, or fails with [`IndexError::Conflict`] if any
/// key read by the transaction changed in the meantime. Dropping a
/// transaction without committing discards it.
#[async_trait]
pub trait Transaction: Send {
    async fn get(&mut self, key: &Key) -> IndexResult<Option<Row>>;

    fn put(&mut self, row: Row);

    async fn commit(self: Box<Self>) -> IndexResult<()>;
}

/// Strongly consistent key/value index.
///
/// Implementations must be thread-safe and linearizable per key. A `put`
/// replaces the whole row.
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Read a row. Returns `Ok(None)` if it does not exist.
    async fn get(&self, key: &Key) -> IndexResult<Option<Row>>;

    /// Create or replace a row.
    async fn put(&self, row: Row) -> IndexResult<()>;

    /// Delete a row. Returns `true` if it existed.
    async fn delete(&self, key: &Key) -> IndexResult<bool>;

    /// Run an ancestor-scoped, ordered query.
    async fn query(&self, query: &Query) -> IndexResult<QueryPage>;

    /// Start an optimistic transaction.
    async fn begin(&self) -> IndexResult<Box<dyn Transaction>>;
}
