//! Bundle-scoped, newest-first pagination over index rows.

use haystack_index::{IndexError, MetadataIndex, Query, Row};
use haystack_types::{BundleName, Page, PageCursor};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};

/// List one page of `kind` rows stored under `bundle`, newest first.
///
/// A cursor issued for another bundle is rejected before the index is
/// touched. The returned page carries a cursor only when it is full; a
/// short page means the end of the listing was reached.
pub async fn list_newest_first<T: DeserializeOwned>(
    index: &dyn MetadataIndex,
    kind: &str,
    bundle: &BundleName,
    cursor: Option<&PageCursor>,
    page_size: usize,
) -> LedgerResult<Page<T>> {
    if page_size == 0 {
        return Err(LedgerError::InvalidPageSize);
    }

    let start = match cursor {
        None => None,
        Some(cursor) => {
            let position = cursor
                .position_for(bundle)
                .ok_or_else(|| LedgerError::CursorMismatch {
                    expected: bundle.clone(),
                    found: cursor.bundle().clone(),
                })?;
            Some(position.to_string())
        }
    };
    debug!(%bundle, kind, resume = start.is_some(), page_size, "listing page");

    let query = Query::new(kind, bundle.as_str())
        .descending()
        .limit(page_size)
        .start_after(start);
    let page = index.query(&query).await.map_err(|e| match e {
        IndexError::MalformedPosition(reason) => LedgerError::MalformedCursor(reason),
        other => LedgerError::Index(other),
    })?;

    let items = page
        .rows
        .iter()
        .map(Row::decode)
        .collect::<Result<Vec<T>, _>>()?;

    let next = match page.end {
        Some(end) if items.len() == page_size => Some(PageCursor::new(bundle.clone(), end)),
        _ => None,
    };
    Ok(Page { items, next })
}

#[cfg(test)]
mod tests {
    use haystack_index::{Key, LocalIndex};

    use super::*;

    fn bundle(name: &str) -> BundleName {
        BundleName::new(name).unwrap()
    }

    async fn seed(index: &LocalIndex, bundle: &str, values: &[u32]) {
        for (i, value) in values.iter().enumerate() {
            let row = Row::encode(
                Key::child("Item", bundle, format!("{value}")),
                format!("{i:020}"),
                value,
            )
            .unwrap();
            index.put(row).await.unwrap();
        }
    }

    #[tokio::test]
    async fn pages_until_short_page() {
        let index = LocalIndex::in_memory();
        seed(&index, "app", &[10, 20, 30, 40]).await;

        let first: Page<u32> = list_newest_first(&index, "Item", &bundle("app"), None, 3)
            .await
            .unwrap();
        assert_eq!(first.items, vec![40, 30, 20]);
        let cursor = first.next.expect("full page has a cursor");

        let second: Page<u32> =
            list_newest_first(&index, "Item", &bundle("app"), Some(&cursor), 3)
                .await
                .unwrap();
        assert_eq!(second.items, vec![10]);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn exact_multiple_ends_with_empty_page() {
        let index = LocalIndex::in_memory();
        seed(&index, "app", &[1, 2]).await;

        let first: Page<u32> = list_newest_first(&index, "Item", &bundle("app"), None, 2)
            .await
            .unwrap();
        let cursor = first.next.unwrap();
        let second: Page<u32> =
            list_newest_first(&index, "Item", &bundle("app"), Some(&cursor), 2)
                .await
                .unwrap();
        assert!(second.items.is_empty());
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn foreign_cursor_is_rejected() {
        let index = LocalIndex::in_memory();
        seed(&index, "one", &[1, 2, 3]).await;
        seed(&index, "two", &[4, 5, 6]).await;

        let first: Page<u32> = list_newest_first(&index, "Item", &bundle("one"), None, 1)
            .await
            .unwrap();
        let cursor = first.next.unwrap();

        let err = list_newest_first::<u32>(&index, "Item", &bundle("two"), Some(&cursor), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CursorMismatch { .. }));
    }

    #[tokio::test]
    async fn garbage_position_is_malformed_cursor() {
        let index = LocalIndex::in_memory();
        let cursor = PageCursor::new(bundle("app"), "not-a-position");
        let err = list_newest_first::<u32>(&index, "Item", &bundle("app"), Some(&cursor), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedCursor(_)));
    }

    #[tokio::test]
    async fn zero_page_size_is_rejected() {
        let index = LocalIndex::in_memory();
        let err = list_newest_first::<u32>(&index, "Item", &bundle("app"), None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPageSize));
    }
}
