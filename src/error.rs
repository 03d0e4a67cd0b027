//! Error types for the WebSocket server.
//!
//! Every failure here is connection-scoped: the server loop turns any of these
//! into "drop this connection" and keeps serving the others.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding, decoding or serving WebSocket traffic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Payload length does not fit the 63 usable bits of the wire format.
    #[error("Payload too large: {size} bytes")]
    PayloadTooLarge {
        /// Offending payload length.
        size: u64,
    },

    /// The peer closed the socket, possibly in the middle of a frame.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value (does not fit in 4 bits).
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Known opcode this server does not implement (continuation frames).
    #[error("Unsupported opcode: {0:#x}")]
    UnsupportedOpcode(u8),

    /// A handler callback failed or panicked.
    #[error("Handler error: {0}")]
    Handler(String),
}

impl Error {
    /// Build a [`Error::Handler`] from anything displayable.
    ///
    /// Handlers use this to report application-level failures; the server
    /// logs them and drops the connection.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        Error::Handler(err.to_string())
    }

    /// Whether the peer went away (EOF) rather than misbehaving.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(err.to_string()),
        }
    }
}
