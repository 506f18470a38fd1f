//! Records persisted in the metadata index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::names::{BundleName, OwnerId, TagName};

/// The first-writer-wins binding of a bundle name to its owner.
///
/// Created exactly once, on the first successful upload under `bundle`, and
/// never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleOwner {
    pub bundle: BundleName,
    pub owner: OwnerId,
    pub registered_at: DateTime<Utc>,
}

impl BundleOwner {
    /// Returns `true` if `owner` is the registered owner.
    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        self.owner == *owner
    }
}

/// One immutable, timestamped record of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub bundle: BundleName,
    pub digest: Digest,
    pub created_at: DateTime<Utc>,
}

/// A mutable named pointer from (bundle, tag name) to a revision digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub bundle: BundleName,
    pub name: TagName,
    pub digest: Digest,
    pub created_at: DateTime<Utc>,
}
