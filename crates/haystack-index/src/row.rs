use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// Address of a row.
///
/// Keys order by kind, then ancestor, then name, so all rows of one kind
/// under one ancestor are contiguous.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub kind: String,
    pub ancestor: Option<String>,
    pub name: String,
}

impl Key {
    /// A top-level key with no ancestor.
    pub fn root(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ancestor: None,
            name: name.into(),
        }
    }

    /// A key scoped under `ancestor`.
    pub fn child(
        kind: impl Into<String>,
        ancestor: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            ancestor: Some(ancestor.into()),
            name: name.into(),
        }
    }
}

/// A stored row: key, ordering key, and encoded value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub key: Key,
    /// Sort key used by queries; ties are broken by `key.name`.
    pub order_key: String,
    pub value: Vec<u8>,
}

impl Row {
    /// Encode `value` with bincode into a new row.
    pub fn encode<T: Serialize>(key: Key, order_key: impl Into<String>, value: &T) -> IndexResult<Self> {
        let value = bincode::serialize(value).map_err(|e| IndexError::Serialization(e.to_string()))?;
        Ok(Self {
            key,
            order_key: order_key.into(),
            value,
        })
    }

    /// Decode the row value.
    pub fn decode<T: DeserializeOwned>(&self) -> IndexResult<T> {
        bincode::deserialize(&self.value).map_err(|e| IndexError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_group_by_kind_then_ancestor() {
        let mut keys = vec![
            Key::child("Tag", "b", "x"),
            Key::child("Revision", "b", "2"),
            Key::root("Owner", "b"),
            Key::child("Revision", "a", "9"),
            Key::child("Revision", "b", "1"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::root("Owner", "b"),
                Key::child("Revision", "a", "9"),
                Key::child("Revision", "b", "1"),
                Key::child("Revision", "b", "2"),
                Key::child("Tag", "b", "x"),
            ]
        );
    }

    #[test]
    fn encode_decode_value() {
        let row = Row::encode(Key::root("K", "n"), "001", &("hello".to_string(), 42u32)).unwrap();
        let (s, n): (String, u32) = row.decode().unwrap();
        assert_eq!(s, "hello");
        assert_eq!(n, 42);
    }

    #[test]
    fn decode_wrong_type_fails() {
        let row = Row {
            key: Key::root("K", "n"),
            order_key: String::new(),
            value: vec![1],
        };
        assert!(matches!(
            row.decode::<String>(),
            Err(IndexError::Serialization(_))
        ));
    }
}
