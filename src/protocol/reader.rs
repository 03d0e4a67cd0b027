//! Incremental payload reader bound to one decoded frame.
//!
//! The reader pulls payload bytes straight off the socket in caller-chosen
//! chunks and unmasks them on the fly. The mask index is derived from the
//! absolute payload position, so chunk boundaries never affect the output.
//! It never reads past the frame: once `position == length` it reports end of
//! stream and leaves the socket positioned on the next header.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::protocol::frame::FrameHeader;
use crate::protocol::mask::apply_mask_at;

/// Upper bound on the up-front allocation in [`PayloadReader::read_to_end`].
const MAX_PREALLOC: u64 = 64 * 1024;

/// Cursor over the payload of a single frame.
pub struct PayloadReader<'a> {
    stream: &'a mut (dyn AsyncRead + Unpin + Send),
    mask: Option<[u8; 4]>,
    length: u64,
    position: u64,
}

impl<'a> PayloadReader<'a> {
    /// Bind a reader to `stream` for the payload described by `header`.
    ///
    /// `stream` must be positioned right after the header.
    pub fn new(stream: &'a mut (dyn AsyncRead + Unpin + Send), header: &FrameHeader) -> Self {
        Self {
            stream,
            mask: header.mask,
            length: header.length,
            position: 0,
        }
    }

    /// Total payload length.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left in the payload.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.length - self.position
    }

    /// End of stream: the whole payload has been consumed.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.position == self.length
    }

    /// Read up to `buf.len()` unmasked payload bytes with a single socket read.
    ///
    /// Returns the number of bytes written to `buf`, which may be less than
    /// requested; callers loop. Returns `0` at end of stream (or when `buf` is
    /// empty).
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the socket hits EOF before the payload ends
    /// - `Error::Io` if the socket read fails
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.is_eof() || buf.is_empty() {
            return Ok(0);
        }

        let want = self.remaining().min(buf.len() as u64) as usize;
        let n = self.stream.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        if let Some(mask) = self.mask {
            apply_mask_at(&mut buf[..n], mask, self.position);
        }
        self.position += n as u64;
        Ok(n)
    }

    /// Read up to `max` bytes into a new buffer.
    ///
    /// Returns `None` at end of stream.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>> {
        if self.is_eof() {
            return Ok(None);
        }
        let size = self.remaining().min(max.max(1) as u64) as usize;
        let mut chunk = BytesMut::zeroed(size);
        let n = self.read(&mut chunk).await?;
        chunk.truncate(n);
        Ok(Some(chunk.freeze()))
    }

    /// Read the rest of the payload into memory, `chunk_size` bytes at a time.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn read_to_end(&mut self, chunk_size: usize) -> Result<Vec<u8>> {
        let capacity = usize::try_from(self.remaining().min(MAX_PREALLOC)).unwrap_or(0);
        let mut out = Vec::with_capacity(capacity);
        let mut chunk = vec![0u8; chunk_size.max(1)];
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    /// Discard the rest of the payload. Returns the number of bytes skipped.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn drain(&mut self, chunk_size: usize) -> Result<u64> {
        let start = self.position;
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        let mut chunk = vec![0u8; chunk_size.max(1).min(remaining)];
        while self.read(&mut chunk).await? > 0 {}
        Ok(self.position - start)
    }
}
