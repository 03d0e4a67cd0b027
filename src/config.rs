//! Server configuration.

/// Default size of the single read used for the HTTP upgrade request.
pub const DEFAULT_HANDSHAKE_BUFFER_SIZE: usize = 2048;

/// Default chunk size used when a payload is read whole or drained.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: u32 = 255;

/// WebSocket server configuration.
///
/// The bind address is passed to [`Server::bind`](crate::Server::bind)
/// separately; everything here has a sensible default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Size of the one read that carries the upgrade request.
    ///
    /// Requests larger than this, or pipelined behind it, are not supported.
    ///
    /// Default: 2048
    pub handshake_buffer_size: usize,

    /// Chunk size used by [`IncomingFrame::payload`](crate::IncomingFrame::payload)
    /// and when the server drains an unread payload.
    ///
    /// Default: 1024
    pub read_chunk_size: usize,

    /// Listen backlog for the server socket.
    ///
    /// Default: 255
    pub backlog: u32,

    /// Set `SO_REUSEADDR` on the listening socket.
    ///
    /// Default: true
    pub reuse_address: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            handshake_buffer_size: DEFAULT_HANDSHAKE_BUFFER_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            backlog: DEFAULT_BACKLOG,
            reuse_address: true,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handshake read size. Zero is bumped to one byte.
    #[must_use]
    pub const fn with_handshake_buffer_size(mut self, size: usize) -> Self {
        self.handshake_buffer_size = if size == 0 { 1 } else { size };
        self
    }

    /// Set the payload read chunk size. Zero is bumped to one byte.
    #[must_use]
    pub const fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = if size == 0 { 1 } else { size };
        self
    }

    /// Set the listen backlog.
    #[must_use]
    pub const fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Enable or disable `SO_REUSEADDR`.
    #[must_use]
    pub const fn with_reuse_address(mut self, reuse: bool) -> Self {
        self.reuse_address = reuse;
        self
    }
}
