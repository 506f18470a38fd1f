//! Tee adapter that hashes bytes as they are read.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use haystack_types::Digest;
use tokio::io::{AsyncRead, ReadBuf};

use crate::hasher::ContentHasher;

/// Wraps an [`AsyncRead`] and hashes every byte handed to the consumer.
///
/// Whatever reads from a `HashingReader` (typically an object backend `put`)
/// sees exactly the bytes that were hashed: hashing happens on the filled
/// region of the caller's buffer after each successful poll, with no
/// internal buffering.
pub struct HashingReader<R> {
    inner: R,
    hasher: ContentHasher,
}

impl<R> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: ContentHasher::new(),
        }
    }

    /// Bytes read through this adapter so far.
    pub fn bytes_read(&self) -> u64 {
        self.hasher.bytes_hashed()
    }

    /// Digest of everything read so far.
    pub fn finalize(self) -> Digest {
        self.hasher.finalize()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.hasher.update(&buf.filled()[before..]);
        Poll::Ready(Ok(()))
    }
}

impl<R> std::fmt::Debug for HashingReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingReader")
            .field("bytes_read", &self.bytes_read())
            .finish()
    }
}
