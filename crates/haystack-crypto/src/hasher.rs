use haystack_types::{Digest, DIGEST_LEN};
use sha2::{Digest as _, Sha512};

/// Incremental SHA-512 hasher producing a [`Digest`].
///
/// Feeding the same bytes in any chunking yields the same digest as
/// hashing them in one call.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha512,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb the next chunk of content.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes absorbed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Consume the hasher and return the digest.
    pub fn finalize(self) -> Digest {
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&self.inner.finalize());
        Digest::from_hash(out)
    }

    /// One-shot digest of a byte slice.
    pub fn digest(data: &[u8]) -> Digest {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Verify that data produces the expected digest.
    pub fn verify(data: &[u8], expected: &Digest) -> bool {
        Self::digest(data) == *expected
    }
}

impl std::fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentHasher")
            .field("bytes", &self.bytes)
            .finish()
    }
}
