//! Raw WebSocket client used by the integration tests.
//!
//! Masks every frame it sends, like a browser would, and reads the server's
//! frames back through the crate's own decoder.

use std::io;
use std::net::SocketAddr;

use hybiws::{Frame, IncomingFrame, OpCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Key from the RFC 6455 handshake example.
pub const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

/// Accept token the server must answer [`SAMPLE_KEY`] with.
pub const SAMPLE_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

pub struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Connect and complete a standard handshake.
    pub async fn open(addr: SocketAddr) -> io::Result<Self> {
        let mut client = Self::connect(addr).await?;
        let response = client.handshake("/chat", Some(SAMPLE_KEY)).await?;
        assert!(
            response.starts_with("HTTP/1.1 101 "),
            "unexpected response: {response}"
        );
        Ok(client)
    }

    /// Send an upgrade request and return the raw response head.
    ///
    /// The response is read byte by byte so frames sent right after it stay
    /// in the socket.
    pub async fn handshake(&mut self, resource: &str, key: Option<&str>) -> io::Result<String> {
        let mut request = format!(
            "GET {resource} HTTP/1.1\r\n\
             Host: localhost\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Origin: http://localhost\r\n\
             Sec-WebSocket-Protocol: chat\r\n\
             Sec-WebSocket-Version: 13\r\n"
        );
        if let Some(key) = key {
            request.push_str(&format!("Sec-WebSocket-Key: {key}\r\n"));
        }
        request.push_str("\r\n");
        self.send_raw(request.as_bytes()).await?;

        let mut head = Vec::new();
        while !head.ends_with(b"\r\n\r\n") {
            head.push(self.stream.read_u8().await?);
        }
        Ok(String::from_utf8_lossy(&head).into_owned())
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Mask `frame` with a fresh key and send it.
    pub async fn send_frame(&mut self, frame: Frame) -> io::Result<()> {
        let bytes = frame
            .with_random_mask()
            .encode()
            .map_err(|err| io::Error::other(err.to_string()))?;
        self.send_raw(&bytes).await
    }

    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.send_frame(Frame::text(text)).await
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) -> io::Result<()> {
        self.send_frame(Frame::binary(data)).await
    }

    /// Read one whole frame.
    pub async fn read_frame(&mut self) -> hybiws::Result<(OpCode, Vec<u8>)> {
        let mut frame = IncomingFrame::decode(&mut self.stream).await?;
        let opcode = frame.opcode()?;
        let payload = frame.payload().await?;
        Ok((opcode, payload))
    }

    /// Read until the server closes the socket; returns whatever arrived first.
    ///
    /// A reset counts as closed: the server may drop a socket with unread
    /// input.
    pub async fn expect_eof(&mut self) -> Vec<u8> {
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match self.stream.read(&mut buf).await {
                Ok(0) => return received,
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(err) if err.kind() == io::ErrorKind::ConnectionReset => return received,
                Err(err) => panic!("read failed while waiting for close: {err}"),
            }
        }
    }

    /// Half-close the write side.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
