use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::connection::ConnectionId;
use crate::error::Result;
use crate::protocol::Frame;

/// Handle for talking back to one peer during a handler callback.
///
/// Every send encodes one unmasked frame and writes it in full before
/// returning; a short write is an error. Writes block the server loop until
/// they complete, so a slow peer delays every other connection.
///
/// ## Example
///
/// ```rust,ignore
/// conn.send("hello").await?;
/// conn.send_binary(&[0xde, 0xad]).await?;
/// conn.ping().await?;
/// ```
pub struct Connection<'a> {
    id: ConnectionId,
    peer: &'a str,
    writer: &'a mut (dyn AsyncWrite + Unpin + Send),
}

impl<'a> Connection<'a> {
    /// Wrap the write side of a registered socket.
    pub fn new(
        id: ConnectionId,
        peer: &'a str,
        writer: &'a mut (dyn AsyncWrite + Unpin + Send),
    ) -> Self {
        Self { id, peer, writer }
    }

    /// The server-assigned connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote `address:port`.
    #[must_use]
    pub fn peer_id(&self) -> &str {
        self.peer
    }

    /// Send a text frame.
    ///
    /// # Errors
    ///
    /// I/O errors from the socket.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        self.send_frame(&Frame::text(text)).await
    }

    /// Send a binary frame.
    ///
    /// # Errors
    ///
    /// I/O errors from the socket.
    pub async fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.send_frame(&Frame::binary(bytes::Bytes::copy_from_slice(data)))
            .await
    }

    /// Send an empty ping frame.
    ///
    /// # Errors
    ///
    /// I/O errors from the socket.
    pub async fn ping(&mut self) -> Result<()> {
        self.send_frame(&Frame::ping()).await
    }

    /// Send an empty pong frame.
    ///
    /// # Errors
    ///
    /// I/O errors from the socket.
    pub async fn pong(&mut self) -> Result<()> {
        self.send_frame(&Frame::pong()).await
    }

    /// Send an empty close frame.
    ///
    /// This only writes the frame; the connection stays registered until the
    /// peer answers or the socket fails.
    ///
    /// # Errors
    ///
    /// I/O errors from the socket.
    pub async fn close(&mut self) -> Result<()> {
        self.send_frame(&Frame::close()).await
    }

    /// Encode `frame` and write all of it.
    ///
    /// # Errors
    ///
    /// - `Error::PayloadTooLarge` if the frame cannot be encoded
    /// - I/O errors from the socket, including partial writes
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode()?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        trace!(
            conn = %self.id,
            peer = self.peer,
            opcode = %frame.opcode,
            len = frame.payload().len(),
            "sent frame"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Connection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish()
    }
}
