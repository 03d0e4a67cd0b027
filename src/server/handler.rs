//! The application capability the server dispatches to.

use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::{HandshakeHeaders, IncomingFrame};

/// Application callbacks invoked by [`Server`](crate::Server).
///
/// All callbacks run inside the server loop, one at a time. A callback that
/// returns `Err` or panics gets its connection dropped; other connections are
/// unaffected.
///
/// ## Example
///
/// ```rust,ignore
/// struct Echo;
///
/// impl Handler for Echo {
///     async fn receive(&mut self, conn: &mut Connection<'_>, frame: &mut IncomingFrame<'_>) -> Result<()> {
///         let body = frame.payload().await?;
///         conn.send_binary(&body).await
///     }
/// }
/// ```
#[allow(async_fn_in_trait)]
pub trait Handler {
    /// Called once per connection, right after a successful handshake.
    async fn open(&mut self, conn: &mut Connection<'_>, headers: &HandshakeHeaders) -> Result<()> {
        let _ = (conn, headers);
        Ok(())
    }

    /// Called for every text or binary frame.
    ///
    /// The payload has not been read yet: use [`IncomingFrame::reader`] to
    /// stream it or [`IncomingFrame::payload`] to load it whole. Whatever is
    /// left unread is discarded after this returns, and the server then sends
    /// a ping.
    async fn receive(
        &mut self,
        conn: &mut Connection<'_>,
        frame: &mut IncomingFrame<'_>,
    ) -> Result<()>;

    /// Called when the peer sends a close frame, just before the connection is
    /// dropped. Not called when the socket fails or the peer vanishes.
    async fn close(&mut self, conn: &mut Connection<'_>) -> Result<()> {
        let _ = conn;
        Ok(())
    }
}
