//! Per-connection view and lifecycle state.
//!
//! A [`Connection`] is a short-lived handle the server builds for each
//! callback. It borrows the write half of a registered socket and knows the
//! peer's identity, but owns nothing: the server's registry is the durable
//! record of a connection.
//!
//! ## Connection Lifecycle
//!
//! 1. **Accepted** - socket registered, handshake not yet done
//! 2. **Open** - handshake succeeded, `open` callback fired
//! 3. **Closed** - removed from the registry; there is no way back
//!
//! ## Example
//!
//! ```rust,ignore
//! async fn receive(&mut self, conn: &mut Connection<'_>, frame: &mut IncomingFrame<'_>) -> Result<()> {
//!     let text = frame.text().await?;
//!     conn.send(&text).await
//! }
//! ```

mod id;
mod state;

pub use id::ConnectionId;
pub use state::ConnectionState;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::Connection;
