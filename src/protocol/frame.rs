//! Frame encoding and header decoding (RFC 6455 section 5.2).
//!
//! Outgoing frames are built in memory and encoded in one piece. Incoming
//! frames are decoded header-first: [`FrameHeader::read_from`] pulls exactly
//! the header bytes off the socket and [`IncomingFrame`] binds a
//! [`PayloadReader`] for the body, so the payload is never buffered up front.

use std::fmt;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::DEFAULT_READ_CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::{apply_mask, random_mask};
use crate::protocol::reader::PayloadReader;

/// Largest payload length representable on the wire (63 bits).
pub const MAX_PAYLOAD_LEN: u64 = i64::MAX as u64;

/// Sign bit of the 64-bit extended length, ignored on decode.
const LENGTH_SIGN_BIT: u64 = 1 << 63;

/// An outgoing WebSocket frame with its payload held in memory.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                 Masking key (if MASK is set)                  |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// RSV1, RSV2, RSV3, in wire order.
    pub rsv: [bool; 3],
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key. Clients must mask, servers must not.
    pub mask: Option<[u8; 4]>,
    payload: Bytes,
}

impl Frame {
    /// Create a final, unmasked frame with clear reserved bits.
    #[must_use]
    pub fn new(opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            rsv: [false; 3],
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::new(OpCode::Text, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Binary, data)
    }

    /// Create an empty ping frame.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(OpCode::Ping, Bytes::new())
    }

    /// Create an empty pong frame.
    #[must_use]
    pub fn pong() -> Self {
        Self::new(OpCode::Pong, Bytes::new())
    }

    /// Create an empty close frame.
    #[must_use]
    pub fn close() -> Self {
        Self::new(OpCode::Close, Bytes::new())
    }

    /// Set the FIN bit.
    #[must_use]
    pub fn with_fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Set the three reserved bits.
    #[must_use]
    pub fn with_rsv(mut self, rsv: [bool; 3]) -> Self {
        self.rsv = rsv;
        self
    }

    /// Mask the payload with `mask` when encoded.
    #[must_use]
    pub fn with_mask(mut self, mask: [u8; 4]) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Mask the payload with a freshly generated key.
    #[must_use]
    pub fn with_random_mask(self) -> Self {
        self.with_mask(random_mask())
    }

    /// The unmasked payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Size of the header (base, extended length and mask key) on the wire.
    #[must_use]
    pub fn header_len(&self) -> usize {
        let extended = match self.payload.len() {
            0..=125 => 0,
            126..=65535 => 2,
            _ => 8,
        };
        let mask = if self.mask.is_some() { 4 } else { 0 };
        2 + extended + mask
    }

    /// Total size of the encoded frame.
    #[must_use]
    pub fn wire_size(&self) -> usize {
        self.header_len() + self.payload.len()
    }

    /// Write the encoded frame into `buf` and return the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `Error::PayloadTooLarge` if the payload needs more than 63 length bits
    /// - `Error::InvalidFrame` if `buf` is shorter than [`wire_size`](Self::wire_size)
    pub fn write(&self, buf: &mut [u8]) -> Result<usize> {
        let payload_len = self.payload.len();
        if payload_len as u64 > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                size: payload_len as u64,
            });
        }

        let total_size = self.wire_size();
        if buf.len() < total_size {
            return Err(Error::InvalidFrame(format!(
                "Buffer too small: need {} bytes, have {}",
                total_size,
                buf.len()
            )));
        }

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        for (i, set) in self.rsv.iter().enumerate() {
            if *set {
                byte0 |= 0x40 >> i;
            }
        }
        buf[0] = byte0;

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0x00 };
        let mut offset = 2;
        match payload_len {
            0..=125 => buf[1] = mask_bit | payload_len as u8,
            126..=65535 => {
                buf[1] = mask_bit | 126;
                buf[2..4].copy_from_slice(&(payload_len as u16).to_be_bytes());
                offset += 2;
            }
            _ => {
                buf[1] = mask_bit | 127;
                buf[2..10].copy_from_slice(&(payload_len as u64).to_be_bytes());
                offset += 8;
            }
        }

        if let Some(mask) = self.mask {
            buf[offset..offset + 4].copy_from_slice(&mask);
            offset += 4;
        }

        let body = &mut buf[offset..offset + payload_len];
        body.copy_from_slice(&self.payload);
        if let Some(mask) = self.mask {
            apply_mask(body, mask);
        }

        Ok(total_size)
    }

    /// Encode the frame into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` if the payload needs more than 63 length bits.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(self.wire_size());
        let written = self.write(&mut buf)?;
        buf.truncate(written);
        Ok(buf.freeze())
    }
}

/// A decoded frame header. The payload has not been read yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// RSV1, RSV2, RSV3, in wire order.
    pub rsv: [bool; 3],
    /// Raw 4-bit opcode, kept as-is so unknown values reach the dispatcher.
    pub raw_opcode: u8,
    /// Masking key, if the MASK bit was set.
    pub mask: Option<[u8; 4]>,
    /// Payload length in bytes.
    pub length: u64,
}

impl FrameHeader {
    /// Interpret the raw opcode.
    ///
    /// # Errors
    ///
    /// `Error::ReservedOpcode` for opcodes RFC 6455 leaves undefined.
    pub fn opcode(&self) -> Result<OpCode> {
        OpCode::from_u8(self.raw_opcode)
    }

    /// Size of this header on the wire.
    #[must_use]
    pub fn header_len(&self) -> usize {
        let extended = match self.length {
            0..=125 => 0,
            126..=65535 => 2,
            _ => 8,
        };
        2 + extended + if self.mask.is_some() { 4 } else { 0 }
    }

    /// Read exactly one header off `reader`.
    ///
    /// Reads 2 bytes, then 2 or 8 extended length bytes when the 7-bit length
    /// is 126 or 127, then 4 mask bytes when the MASK bit is set. Nothing
    /// beyond the header is consumed.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the stream ends at any stage
    /// - `Error::Io` if the underlying read fails
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut base = [0u8; 2];
        reader.read_exact(&mut base).await?;

        let length = match base[1] & 0x7F {
            126 => {
                let mut ext = [0u8; 2];
                reader.read_exact(&mut ext).await?;
                u64::from(u16::from_be_bytes(ext))
            }
            127 => {
                let mut ext = [0u8; 8];
                reader.read_exact(&mut ext).await?;
                u64::from_be_bytes(ext) & !LENGTH_SIGN_BIT
            }
            short => u64::from(short),
        };

        let mask = if base[1] & 0x80 != 0 {
            let mut key = [0u8; 4];
            reader.read_exact(&mut key).await?;
            Some(key)
        } else {
            None
        };

        Ok(Self::from_base(base, length, mask))
    }

    /// Parse a header from the front of `buf`.
    ///
    /// Returns the header and the number of bytes it occupies.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFrame` if `buf` ends before the header does.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let need = |n: usize| {
            if buf.len() < n {
                Err(Error::InvalidFrame(format!(
                    "Incomplete header: need {} more bytes",
                    n - buf.len()
                )))
            } else {
                Ok(())
            }
        };

        need(2)?;
        let base = [buf[0], buf[1]];
        let (length, mut offset) = match base[1] & 0x7F {
            126 => {
                need(4)?;
                (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
            }
            127 => {
                need(10)?;
                let mut ext = [0u8; 8];
                ext.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(ext) & !LENGTH_SIGN_BIT, 10)
            }
            short => (u64::from(short), 2),
        };

        let mask = if base[1] & 0x80 != 0 {
            need(offset + 4)?;
            let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
            offset += 4;
            Some(key)
        } else {
            None
        };

        Ok((Self::from_base(base, length, mask), offset))
    }

    fn from_base(base: [u8; 2], length: u64, mask: Option<[u8; 4]>) -> Self {
        Self {
            fin: base[0] & 0x80 != 0,
            rsv: [base[0] & 0x40 != 0, base[0] & 0x20 != 0, base[0] & 0x10 != 0],
            raw_opcode: base[0] & 0x0F,
            mask,
            length,
        }
    }
}

impl fmt::Display for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |b: bool| u8::from(b);
        write!(
            f,
            "fin={} rsv={}{}{} opcode={:#x} mask=",
            bit(self.fin),
            bit(self.rsv[0]),
            bit(self.rsv[1]),
            bit(self.rsv[2]),
            self.raw_opcode,
        )?;
        match self.mask {
            Some(m) => write!(f, "{:02x}{:02x}{:02x}{:02x}", m[0], m[1], m[2], m[3])?,
            None => f.write_str("-")?,
        }
        write!(f, " len={}", self.length)
    }
}

/// An incoming frame: a decoded header plus a live reader for its payload.
pub struct IncomingFrame<'a> {
    header: FrameHeader,
    reader: PayloadReader<'a>,
    chunk_size: usize,
}

impl<'a> IncomingFrame<'a> {
    /// Bind a payload reader over `stream` for an already-decoded header.
    pub fn new(
        header: FrameHeader,
        stream: &'a mut (dyn AsyncRead + Unpin + Send),
        chunk_size: usize,
    ) -> Self {
        Self {
            reader: PayloadReader::new(stream, &header),
            header,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Decode the next frame header from `stream` and bind its payload.
    ///
    /// # Errors
    ///
    /// See [`FrameHeader::read_from`].
    pub async fn decode(stream: &'a mut (dyn AsyncRead + Unpin + Send)) -> Result<Self> {
        let header = FrameHeader::read_from(&mut *stream).await?;
        Ok(Self::new(header, stream, DEFAULT_READ_CHUNK_SIZE))
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Interpreted opcode.
    ///
    /// # Errors
    ///
    /// `Error::ReservedOpcode` for undefined opcodes.
    pub fn opcode(&self) -> Result<OpCode> {
        self.header.opcode()
    }

    /// Whether this is a text frame.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.header.raw_opcode == OpCode::Text.as_u8()
    }

    /// Whether this is a binary frame.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.header.raw_opcode == OpCode::Binary.as_u8()
    }

    /// Payload length announced by the header.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.header.length
    }

    /// Whether the frame carries no payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.length == 0
    }

    /// The incremental payload stream.
    pub fn reader(&mut self) -> &mut PayloadReader<'a> {
        &mut self.reader
    }

    /// Read the rest of the payload into memory.
    ///
    /// Bytes already consumed through [`reader`](Self::reader) are not
    /// returned again.
    ///
    /// # Errors
    ///
    /// Fails if the socket read fails or the peer closes mid-payload.
    pub async fn payload(&mut self) -> Result<Vec<u8>> {
        self.reader.read_to_end(self.chunk_size).await
    }

    /// Read the rest of the payload as text, replacing invalid UTF-8.
    ///
    /// # Errors
    ///
    /// See [`payload`](Self::payload).
    pub async fn text(&mut self) -> Result<String> {
        let bytes = self.payload().await?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }

    /// Consume whatever payload is left so the stream sits on the next header.
    ///
    /// # Errors
    ///
    /// See [`payload`](Self::payload).
    pub async fn drain(&mut self) -> Result<u64> {
        self.reader.drain(self.chunk_size).await
    }
}

impl fmt::Debug for IncomingFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingFrame")
            .field("header", &self.header)
            .field("position", &self.reader.position())
            .finish()
    }
}
