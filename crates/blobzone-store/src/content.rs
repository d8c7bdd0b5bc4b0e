use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::AsyncRead;

/// Readable body of a blob, consumed incrementally.
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Bytes handed to an upload: either fully buffered or a stream.
///
/// Streams are pulled by the backend as it writes, so a slow destination
/// slows the reader instead of growing a buffer.
pub enum BlobContent {
    Bytes(Bytes),
    Stream(BlobReader),
}

impl BlobContent {
    /// Wrap any async reader.
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::Stream(Box::pin(reader))
    }

    /// Turn the content into a reader regardless of how it was supplied.
    pub fn into_reader(self) -> BlobReader {
        match self {
            Self::Bytes(b) => Box::pin(std::io::Cursor::new(b)),
            Self::Stream(r) => r,
        }
    }
}

impl fmt::Debug for BlobContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for BlobContent {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<u8>> for BlobContent {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<&'static [u8]> for BlobContent {
    fn from(s: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(s))
    }
}

impl From<BlobReader> for BlobContent {
    fn from(r: BlobReader) -> Self {
        Self::Stream(r)
    }
}
