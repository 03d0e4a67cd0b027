//! # hybiws - single-task RFC 6455 WebSocket server
//!
//! `hybiws` is a small WebSocket server built from its parts: a bit-exact
//! frame codec, a payload reader that streams and unmasks bodies straight
//! off the socket, a lenient opening handshake and a readiness loop that
//! multiplexes every connection on one task.
//!
//! ## Features
//!
//! - **Streaming payloads**: frame bodies are never buffered unless the
//!   handler asks for them
//! - **One task, no locks**: all connection state lives in a registry owned
//!   by the loop
//! - **Fault isolation**: a handler error or panic drops only its connection
//!
//! Fragmentation, extensions, TLS and close-code negotiation are not
//! supported.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hybiws::{Connection, Handler, IncomingFrame, Result, Server};
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     async fn receive(&mut self, conn: &mut Connection<'_>, frame: &mut IncomingFrame<'_>) -> Result<()> {
//!         let text = frame.text().await?;
//!         conn.send(&text).await
//!     }
//! }
//!
//! let mut server = Server::bind("127.0.0.1:9000", Echo).await?;
//! server.serve().await;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;

pub use config::Config;
pub use connection::{Connection, ConnectionId, ConnectionState};
pub use error::{Error, Result};
pub use protocol::{
    Frame, FrameHeader, HandshakeHeaders, HandshakeResponse, IncomingFrame, OpCode, PayloadReader,
    WS_GUID, compute_accept_key,
};
pub use server::{Handler, Server};
