use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Length in bytes of a SHA-512 digest.
pub const DIGEST_LEN: usize = 64;

/// Content digest of an uploaded bundle.
///
/// A `Digest` is the SHA-512 hash of exactly the bytes of one upload.
/// Identical content always produces the same `Digest`, which is what makes
/// permanent objects deduplicatable. It is rendered and serialized as 128
/// lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Create a `Digest` from a pre-computed hash.
    pub const fn from_hash(hash: [u8; DIGEST_LEN]) -> Self {
        Self(hash)
    }

    /// The raw 64-byte hash.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 12 characters), for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// Parse from a hex string. Upper and lower case are both accepted.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != DIGEST_LEN {
            return Err(TypeError::InvalidLength {
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let digest = Digest::from_hash([0xab; DIGEST_LEN]);
        let hex = digest.to_hex();
        assert_eq!(hex.len(), 128);
        assert_eq!(Digest::from_hex(&hex).unwrap(), digest);
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let digest = Digest::from_hash([0xcd; DIGEST_LEN]);
        let upper = digest.to_hex().to_uppercase();
        assert_eq!(Digest::from_hex(&upper).unwrap(), digest);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Digest::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: DIGEST_LEN,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_non_hex() {
        assert!(matches!(
            Digest::from_hex("bad sha"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn display_is_full_hex() {
        let digest = Digest::from_hash([1; DIGEST_LEN]);
        assert_eq!(format!("{digest}"), digest.to_hex());
        assert!(format!("{digest:?}").starts_with("Digest("));
    }

    #[test]
    fn serde_uses_hex_string() {
        let digest = Digest::from_hash([7; DIGEST_LEN]);
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, digest);
    }

    #[test]
    fn ordering_is_bytewise() {
        let a = Digest::from_hash([0; DIGEST_LEN]);
        let b = Digest::from_hash([1; DIGEST_LEN]);
        assert!(a < b);
        assert!(a.to_hex() < b.to_hex());
    }
}
