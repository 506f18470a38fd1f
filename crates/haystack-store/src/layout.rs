//! Object path layout.
//!
//! ```text
//! {bundle}/uploading/{upload-id}        staged upload, removed after promotion
//! {bundle}/revision-data/{digest-hex}   permanent bundle data
//! ```

use haystack_types::{BundleName, Digest};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Prefix under which a bundle's staged uploads live.
pub fn staging_prefix(bundle: &BundleName) -> String {
    format!("{bundle}/uploading/")
}

/// Private staging location for one upload.
pub fn staging_path(bundle: &BundleName, upload_id: &Uuid) -> String {
    format!("{}{upload_id}", staging_prefix(bundle))
}

/// Permanent, digest-keyed location of a bundle revision's bytes.
pub fn revision_path(bundle: &BundleName, digest: &Digest) -> String {
    format!("{bundle}/revision-data/{}", digest.to_hex())
}

/// Check that `path` is a relative, slash-separated object path with no
/// empty, `.` or `..` components.
pub fn validate_path(path: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    if path.contains('\\') || path.chars().any(char::is_control) {
        return Err(invalid("contains a backslash or control character"));
    }
    for component in path.split('/') {
        match component {
            "" => return Err(invalid("empty path component")),
            "." | ".." => return Err(invalid("relative path component")),
            _ => {}
        }
    }
    Ok(())
}
