use std::any::Any;
use std::future::{Future, poll_fn};
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::task::Poll;

use futures::FutureExt;
use tokio::io::ReadBuf;
use tokio::net::{TcpListener, TcpSocket, TcpStream, ToSocketAddrs, lookup_host};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::connection::{Connection, ConnectionId, ConnectionState};
use crate::error::{Error, Result};
use crate::protocol::{FrameHeader, HandshakeHeaders, IncomingFrame, OpCode, negotiate};
use crate::server::handler::Handler;
use crate::server::registry::{ConnectionRecord, Registry};

/// Something the readiness poll found.
enum Ready {
    Accepted(TcpStream, SocketAddr),
    AcceptFailed(io::Error),
    Readable(ConnectionId),
}

/// What to do with a connection after one frame was handled.
enum Flow {
    Keep,
    Close,
}

/// Single-task WebSocket server.
///
/// One [`turn`](Server::turn) waits until the listener or at least one
/// registered socket is ready, then processes every ready socket before
/// returning. Handshakes, frame reads and sends all happen inline, so a slow
/// peer stalls every other connection for as long as it takes.
///
/// ## Example
///
/// ```rust,ignore
/// let mut server = Server::bind("127.0.0.1:9000", MyHandler::default()).await?;
/// server.serve().await
/// ```
pub struct Server<H> {
    listener: TcpListener,
    registry: Registry<TcpStream>,
    config: Config,
    handler: H,
}

impl<H: Handler> Server<H> {
    /// Bind with the default [`Config`].
    ///
    /// # Errors
    ///
    /// `Error::Io` if the address does not resolve or cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs, handler: H) -> Result<Self> {
        Self::bind_with_config(addr, handler, Config::default()).await
    }

    /// Bind to the first resolved address that accepts a listener.
    ///
    /// # Errors
    ///
    /// `Error::Io` if the address does not resolve or cannot be bound.
    pub async fn bind_with_config(
        addr: impl ToSocketAddrs,
        handler: H,
        config: Config,
    ) -> Result<Self> {
        let mut last_err = None;
        for addr in lookup_host(addr).await? {
            match listen(addr, &config) {
                Ok(listener) => {
                    info!(
                        addr = %listener.local_addr().unwrap_or(addr),
                        backlog = config.backlog,
                        "listening"
                    );
                    return Ok(Self {
                        listener,
                        registry: Registry::new(),
                        config,
                        handler,
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err
            .map(Error::from)
            .unwrap_or_else(|| Error::Io("address did not resolve".into())))
    }

    /// The bound address.
    ///
    /// # Errors
    ///
    /// `Error::Io` if the socket cannot report it.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of registered connections, handshaken or not.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Lifecycle state of a connection; unknown ids report `Closed`.
    #[must_use]
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        self.registry.state(id)
    }

    /// Ids of all registered connections in accept order.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.registry.iter().map(|(id, _)| id).collect()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The application handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The application handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Run forever.
    pub async fn serve(&mut self) {
        loop {
            self.turn().await;
        }
    }

    /// Wait for readiness once, then process everything that is ready.
    ///
    /// Returns the number of ready items processed. Never returns zero.
    pub async fn turn(&mut self) -> usize {
        let ready = self.poll_ready().await;
        let count = ready.len();
        trace!(ready = count, registered = self.registry.len(), "woke");

        for item in ready {
            match item {
                Ready::Accepted(stream, peer) => {
                    let id = self.registry.insert(stream, peer.to_string());
                    info!(conn = %id, %peer, "accepted connection");
                }
                Ready::AcceptFailed(err) => {
                    warn!(error = %err, "accept failed");
                }
                Ready::Readable(id) => self.process(id).await,
            }
        }

        count
    }

    /// Resolve once the listener or any registered socket is ready.
    ///
    /// Every ready socket is collected in the same poll. Connection readiness
    /// is confirmed by peeking one byte, so a socket counts as ready only
    /// when data, EOF or an error is actually pending.
    async fn poll_ready(&self) -> Vec<Ready> {
        poll_fn(|cx| {
            let mut ready = Vec::new();

            match self.listener.poll_accept(cx) {
                Poll::Ready(Ok((stream, peer))) => ready.push(Ready::Accepted(stream, peer)),
                Poll::Ready(Err(err)) => ready.push(Ready::AcceptFailed(err)),
                Poll::Pending => {}
            }

            let mut probe = [0u8; 1];
            for (id, record) in self.registry.iter() {
                let mut buf = ReadBuf::new(&mut probe);
                if record.stream.poll_peek(cx, &mut buf).is_ready() {
                    ready.push(Ready::Readable(id));
                }
            }

            if ready.is_empty() {
                Poll::Pending
            } else {
                Poll::Ready(ready)
            }
        })
        .await
    }

    async fn process(&mut self, id: ConnectionId) {
        let Some(record) = self.registry.get_mut(id) else {
            return;
        };

        match record.state() {
            ConnectionState::Accepted => {
                let (stream, peer) = record.io_parts();
                let negotiated = negotiate(stream, self.config.handshake_buffer_size).await;
                match negotiated {
                    Ok(headers) => {
                        debug!(
                            conn = %id,
                            peer,
                            resource = headers.resource.as_deref().unwrap_or("-"),
                            protocol = headers.protocol.as_deref().unwrap_or("-"),
                            "handshake complete"
                        );
                        self.registry.mark_open(id);
                        if let Err(err) = self.open(id, &headers).await {
                            warn!(conn = %id, error = %err, "open callback failed");
                            self.drop_connection(id);
                        }
                    }
                    Err(err) => {
                        debug!(conn = %id, peer, error = %err, "handshake failed");
                        self.drop_connection(id);
                    }
                }
            }
            ConnectionState::Open => {
                let flow = Self::dispatch(&mut self.handler, &self.config, id, record).await;
                match flow {
                    Ok(Flow::Keep) => {}
                    Ok(Flow::Close) => self.drop_connection(id),
                    Err(err) => {
                        debug!(conn = %id, error = %err, "connection failed");
                        self.drop_connection(id);
                    }
                }
            }
            ConnectionState::Closed => self.drop_connection(id),
        }
    }

    async fn open(&mut self, id: ConnectionId, headers: &HandshakeHeaders) -> Result<()> {
        let Some(record) = self.registry.get_mut(id) else {
            return Err(Error::ConnectionClosed);
        };
        let (stream, peer) = record.io_parts();
        let mut conn = Connection::new(id, peer, stream);
        guarded(self.handler.open(&mut conn, headers)).await
    }

    /// Read one frame header and act on its opcode.
    async fn dispatch(
        handler: &mut H,
        config: &Config,
        id: ConnectionId,
        record: &mut ConnectionRecord<TcpStream>,
    ) -> Result<Flow> {
        let (stream, peer) = record.io_parts();
        let (mut reader, mut writer) = stream.split();

        let header = FrameHeader::read_from(&mut reader).await?;
        debug!(conn = %id, peer, frame = %header, "received frame");

        let opcode = match header.opcode() {
            Ok(opcode) if opcode.is_supported() => opcode,
            Ok(_) => {
                warn!(conn = %id, peer, "continuation frame, dropping");
                return Err(Error::UnsupportedOpcode(header.raw_opcode));
            }
            Err(err) => {
                warn!(conn = %id, peer, opcode = header.raw_opcode, "unknown opcode, dropping");
                return Err(err);
            }
        };

        let mut frame = IncomingFrame::new(header, &mut reader, config.read_chunk_size);
        let mut conn = Connection::new(id, peer, &mut writer);

        match opcode {
            OpCode::Text | OpCode::Binary => {
                if let Err(err) = guarded(handler.receive(&mut conn, &mut frame)).await {
                    warn!(conn = %id, error = %err, "receive callback failed");
                    return Err(err);
                }
                let skipped = frame.drain().await?;
                if skipped > 0 {
                    trace!(conn = %id, skipped, "discarded unread payload");
                }
                conn.ping().await?;
                trace!(conn = %id, "sent ping");
                Ok(Flow::Keep)
            }
            OpCode::Ping => {
                frame.drain().await?;
                conn.pong().await?;
                trace!(conn = %id, "answered ping");
                Ok(Flow::Keep)
            }
            OpCode::Pong => {
                frame.drain().await?;
                trace!(conn = %id, "pong received");
                Ok(Flow::Keep)
            }
            OpCode::Close => {
                if let Err(err) = guarded(handler.close(&mut conn)).await {
                    warn!(conn = %id, error = %err, "close callback failed");
                }
                Ok(Flow::Close)
            }
            OpCode::Continuation => Err(Error::UnsupportedOpcode(header.raw_opcode)),
        }
    }

    fn drop_connection(&mut self, id: ConnectionId) {
        if let Some(record) = self.registry.remove(id) {
            info!(
                conn = %id,
                peer = record.peer(),
                remaining = self.registry.len(),
                "connection removed"
            );
        }
    }
}

impl<H> std::fmt::Debug for Server<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listener", &self.listener)
            .field("connections", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn listen(addr: SocketAddr, config: &Config) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(config.reuse_address)?;
    socket.bind(addr)?;
    socket.listen(config.backlog)
}

/// Run a handler callback, turning a panic into `Error::Handler`.
async fn guarded<F>(callback: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(callback).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(Error::handler(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
