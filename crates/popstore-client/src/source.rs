//! Byte sources for object uploads
//!
//! Callers hand the client either a file path or an already-open reader
//! of known length. Both are resolved once into a [`ByteSource`], which
//! is read front to back in part-sized chunks and dropped (closing any
//! file handle) when the upload returns.

use bytes::Bytes;
use popstore_common::{Error, Result};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};

type Reader = Box<dyn AsyncRead + Send + Unpin>;

/// Input of a put-object call
pub enum ObjectSource {
    /// Local file, opened for the duration of the upload
    FilePath(PathBuf),
    /// Open reader that yields exactly `length` bytes
    Stream { reader: Reader, length: u64 },
}

impl ObjectSource {
    /// Source backed by a local file
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::FilePath(path.into())
    }

    /// Source backed by an open reader of known length
    pub fn stream<R>(reader: R, length: u64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream {
            reader: Box::new(reader),
            length,
        }
    }

    /// Source backed by an in-memory buffer
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let length = data.len() as u64;
        Self::stream(Cursor::new(data), length)
    }

    /// Resolve into a readable source of known length
    pub async fn open(self) -> Result<ByteSource> {
        match self {
            Self::FilePath(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::FileNotFound(path.clone())
                    } else {
                        Error::Io(e)
                    }
                })?;
                let metadata = file.metadata().await?;
                if !metadata.is_file() {
                    return Err(Error::invalid_argument(format!(
                        "{} is not a regular file",
                        path.display()
                    )));
                }
                Ok(ByteSource::new(file, metadata.len()))
            }
            Self::Stream { reader, length } => Ok(ByteSource {
                reader,
                length,
                consumed: 0,
            }),
        }
    }
}

impl fmt::Debug for ObjectSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FilePath(path) => f.debug_tuple("FilePath").field(path).finish(),
            Self::Stream { length, .. } => {
                f.debug_struct("Stream").field("length", length).finish_non_exhaustive()
            }
        }
    }
}

/// Sequential reader with a declared total length
pub struct ByteSource {
    reader: Reader,
    length: u64,
    consumed: u64,
}

impl ByteSource {
    /// Wrap a reader that should yield `length` bytes
    pub fn new<R>(reader: R, length: u64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            length,
            consumed: 0,
        }
    }

    /// Declared total length
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.length
    }

    /// `true` when the declared length is zero
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Bytes read so far
    #[must_use]
    pub const fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Read the next chunk of at most `max` bytes.
    ///
    /// The chunk is only shorter than `max` when the reader is exhausted.
    pub async fn read_chunk(&mut self, max: usize) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(max);
        (&mut self.reader).take(max as u64).read_to_end(&mut buf).await?;
        self.consumed += buf.len() as u64;
        Ok(Bytes::from(buf))
    }

    /// Probe whether the reader yields anything past the current position
    pub async fn has_more(&mut self) -> Result<bool> {
        Ok(!self.read_chunk(1).await?.is_empty())
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSource")
            .field("length", &self.length)
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}
