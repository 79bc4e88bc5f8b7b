//! Chunk codec: split a byte source into frames, join frames back.
//!
//! Chunk boundaries carry no meaning. They depend only on the configured
//! chunk size and on where the source runs dry, never on content.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::wire::MAX_CHUNK_SIZE;

/// Clamp a requested chunk size into `1..=MAX_CHUNK_SIZE`.
pub fn clamp_chunk_size(chunk_size: usize) -> usize {
    chunk_size.clamp(1, MAX_CHUNK_SIZE)
}

/// Reads a source as a lazy, finite sequence of chunks.
///
/// Each chunk is filled completely before it is yielded, so only the last
/// one can be short. Restartable only by reopening the source.
pub struct ChunkReader<R> {
    source: R,
    chunk_size: usize,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            chunk_size: clamp_chunk_size(chunk_size),
            exhausted: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Next chunk in source order, or `None` once the source is exhausted.
    /// Never yields an empty chunk.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut buf = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self.source.read(&mut buf[filled..]).await?;
            if n == 0 {
                self.exhausted = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf.freeze()))
    }
}

/// Split an in-memory buffer into chunks of at most `chunk_size` bytes.
pub fn split(data: &Bytes, chunk_size: usize) -> impl Iterator<Item = Bytes> + '_ {
    let size = clamp_chunk_size(chunk_size);
    (0..data.len())
        .step_by(size)
        .map(move |start| data.slice(start..(start + size).min(data.len())))
}

/// Concatenate chunks in order with no gaps.
pub fn join<I>(chunks: I) -> Bytes
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut out = BytesMut::new();
    for chunk in chunks {
        out.extend_from_slice(chunk.as_ref());
    }
    out.freeze()
}

/// The assembled payload of one direction of one session.
///
/// Owned by the pump that receives it. Grows only by appending and is
/// frozen once end-of-stream is seen.
#[derive(Debug, Default)]
pub struct Assembly {
    buf: BytesMut,
    chunks: usize,
    empty_chunks: usize,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one received chunk. Zero-length chunks are counted but add
    /// nothing.
    pub fn append(&mut self, chunk: &[u8]) {
        self.chunks += 1;
        if chunk.is_empty() {
            self.empty_chunks += 1;
            return;
        }
        self.buf.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of chunks appended, including empty ones.
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    pub fn empty_chunk_count(&self) -> usize {
        self.empty_chunks
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
