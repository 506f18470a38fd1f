//! Bundle-scoped pagination.
//!
//! A [`PageCursor`] pairs the bundle it was issued for with an index position
//! marker. On the wire it is hex-encoded JSON: opaque to callers and safe to
//! round-trip through a URL query parameter without escaping.

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::names::BundleName;

/// Opaque, forward-only continuation token for one bundle's listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    bundle: BundleName,
    position: String,
}

impl PageCursor {
    pub fn new(bundle: BundleName, position: impl Into<String>) -> Self {
        Self {
            bundle,
            position: position.into(),
        }
    }

    /// The bundle this cursor was issued for.
    pub fn bundle(&self) -> &BundleName {
        &self.bundle
    }

    /// The index position, but only when listing the bundle the cursor was
    /// issued for. Returns `None` for any other bundle.
    pub fn position_for(&self, bundle: &BundleName) -> Option<&str> {
        (self.bundle == *bundle).then_some(self.position.as_str())
    }

    /// Encode as an opaque token.
    pub fn encode(&self) -> String {
        // Serializing a struct of two strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(json)
    }

    /// Decode a token produced by [`encode`](Self::encode).
    pub fn decode(token: &str) -> Result<Self, TypeError> {
        let json = hex::decode(token).map_err(|e| TypeError::MalformedCursor(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| TypeError::MalformedCursor(e.to_string()))
    }
}

/// One page of a paginated listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Resumption point after the last item; `None` once the end is reached.
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next: None,
        }
    }

    /// The next cursor as a token, or the empty string at the end.
    pub fn next_token(&self) -> String {
        self.next.as_ref().map(PageCursor::encode).unwrap_or_default()
    }

    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(name: &str) -> BundleName {
        BundleName::new(name).unwrap()
    }

    #[test]
    fn encode_decode() {
        let cursor = PageCursor::new(bundle("app"), "00000000000000000042:abc");
        let token = cursor.encode();
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(PageCursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn position_is_scoped_to_bundle() {
        let cursor = PageCursor::new(bundle("one"), "pos");
        assert_eq!(cursor.position_for(&bundle("one")), Some("pos"));
        assert_eq!(cursor.position_for(&bundle("two")), None);
    }

    #[test]
    fn garbage_tokens_are_malformed() {
        for token in ["zz", "abc", &hex::encode(b"not json")] {
            assert!(matches!(
                PageCursor::decode(token),
                Err(TypeError::MalformedCursor(_))
            ));
        }
    }

    #[test]
    fn forged_bundle_name_is_validated() {
        let token = hex::encode(br#"{"bundle":"../etc","position":"x"}"#);
        assert!(PageCursor::decode(&token).is_err());
    }

    #[test]
    fn page_tokens() {
        let last: Page<u8> = Page::empty();
        assert!(last.is_last());
        assert_eq!(last.next_token(), "");

        let more = Page {
            items: vec![1u8],
            next: Some(PageCursor::new(bundle("app"), "p")),
        };
        assert!(!more.is_last());
        assert!(!more.next_token().is_empty());
    }
}
