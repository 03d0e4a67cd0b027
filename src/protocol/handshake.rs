//! Opening handshake (RFC 6455 section 4).
//!
//! The negotiator reads one bounded chunk of the HTTP upgrade request, picks
//! out the headers it needs by line matching and answers with a fixed 101
//! response in a single write. It is lenient: a request without
//! `Sec-WebSocket-Key` still gets a response, with the accept token computed
//! over an empty key. Oversized or pipelined requests are not supported.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Status line of the upgrade response.
pub const RESPONSE_STATUS: &str = "HTTP/1.1 101 WebSocket Protocol Handshake";

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use hybiws::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Headers picked out of the upgrade request.
///
/// Every field is optional because extraction is best effort; see the module
/// docs for what happens when the key is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeHeaders {
    /// Request target from the `GET <target> HTTP/x.y` line.
    pub resource: Option<String>,
    /// `Host` header.
    pub host: Option<String>,
    /// `Origin` header.
    pub origin: Option<String>,
    /// `Sec-WebSocket-Key` header.
    pub key: Option<String>,
    /// Raw `Sec-WebSocket-Protocol` header, possibly a comma-separated list.
    pub protocol: Option<String>,
}

impl HandshakeHeaders {
    /// Extract the handshake headers from a raw request.
    ///
    /// Header names match case-insensitively; the first occurrence wins.
    /// Parsing stops at the blank line that ends the header block, and
    /// anything unrecognised is ignored.
    #[must_use]
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut headers = Self::default();
        let mut lines = text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

        if let Some(request_line) = lines.next() {
            headers.resource = request_target(request_line);
        }

        for line in lines {
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let slot = match name.trim().to_ascii_lowercase().as_str() {
                "host" => &mut headers.host,
                "origin" => &mut headers.origin,
                "sec-websocket-key" => &mut headers.key,
                "sec-websocket-protocol" => &mut headers.protocol,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.trim().to_string());
            }
        }

        headers
    }

    /// The requested subprotocols, split on commas.
    #[must_use]
    pub fn protocols(&self) -> Vec<&str> {
        self.protocol
            .as_deref()
            .map(|p| p.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Accept token for this request. A missing key is hashed as "".
    #[must_use]
    pub fn accept_key(&self) -> String {
        compute_accept_key(self.key.as_deref().unwrap_or_default())
    }

    /// Build the 101 response for this request.
    #[must_use]
    pub fn response(&self) -> HandshakeResponse {
        HandshakeResponse {
            accept: self.accept_key(),
            origin: self.origin.clone().unwrap_or_default(),
            protocol: self.protocol.clone().filter(|p| !p.is_empty()),
        }
    }
}

fn request_target(line: &str) -> Option<String> {
    let rest = line.strip_prefix("GET ")?;
    let end = rest.rfind(" HTTP")?;
    Some(rest[..end].to_string())
}

/// The server's upgrade response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// Echoed as `Sec-WebSocket-Origin`, empty when the request had none.
    pub origin: String,
    /// Echoed `Sec-WebSocket-Protocol`, verbatim.
    pub protocol: Option<String>,
}

impl HandshakeResponse {
    /// Write the HTTP response to a buffer.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(RESPONSE_STATUS.as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(b"Upgrade: WebSocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Origin: {}\r\n", self.origin).as_bytes());
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());
        if let Some(ref proto) = self.protocol {
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {}\r\n", proto).as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
    }

    /// Encode the response into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        self.write(&mut buf);
        buf
    }
}

/// Run the server side of the handshake on `stream`.
///
/// Issues one read of at most `buffer_size` bytes, parses it and writes the
/// 101 response in one `write_all`.
///
/// # Errors
///
/// - `Error::ConnectionClosed` if the peer closed before sending anything
/// - `Error::Io` if the read or the response write fails
pub async fn negotiate<S>(stream: &mut S, buffer_size: usize) -> Result<HandshakeHeaders>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Err(Error::ConnectionClosed);
    }

    let headers = HandshakeHeaders::parse(&buf[..n]);
    if headers.key.is_none() {
        warn!(
            resource = ?headers.resource,
            "upgrade request without Sec-WebSocket-Key, answering anyway"
        );
    }

    let response = headers.response().to_bytes();
    stream.write_all(&response).await?;
    stream.flush().await?;
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Origin: http://example.com\r\n\
        Sec-WebSocket-Protocol: chat, superchat\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    #[test]
    fn test_compute_accept_key_rfc_example() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let expected = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";
        assert_eq!(compute_accept_key(key), expected);
    }

    #[test]
    fn test_parse_request() {
        let headers = HandshakeHeaders::parse(REQUEST);
        assert_eq!(headers.resource.as_deref(), Some("/chat"));
        assert_eq!(headers.host.as_deref(), Some("server.example.com"));
        assert_eq!(headers.origin.as_deref(), Some("http://example.com"));
        assert_eq!(headers.key.as_deref(), Some("dGhlIHNhbXBsZSBub25jZQ=="));
        assert_eq!(headers.protocol.as_deref(), Some("chat, superchat"));
        assert_eq!(headers.protocols(), vec!["chat", "superchat"]);
        assert_eq!(headers.accept_key(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_parse_case_insensitive_first_wins() {
        let request = b"GET /a?b=c HTTP/1.1\r\n\
            HOST: one.example\r\n\
            host: two.example\r\n\
            SEC-WEBSOCKET-KEY: abc\r\n\
            \r\n\
            Origin: after-the-blank-line\r\n";
        let headers = HandshakeHeaders::parse(request);
        assert_eq!(headers.resource.as_deref(), Some("/a?b=c"));
        assert_eq!(headers.host.as_deref(), Some("one.example"));
        assert_eq!(headers.key.as_deref(), Some("abc"));
        assert_eq!(headers.origin, None);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        let headers = HandshakeHeaders::parse(b"\xff\xfe not http at all");
        assert_eq!(headers, HandshakeHeaders::default());
        assert!(headers.protocols().is_empty());
    }

    #[test]
    fn test_missing_key_hashes_empty_string() {
        let headers = HandshakeHeaders::parse(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(headers.key, None);
        assert_eq!(headers.accept_key(), compute_accept_key(""));
    }

    #[test]
    fn test_response_write() {
        let response = HandshakeHeaders::parse(REQUEST).response();
        let text = String::from_utf8(response.to_bytes()).unwrap();

        assert_eq!(
            text,
            "HTTP/1.1 101 WebSocket Protocol Handshake\r\n\
             Upgrade: WebSocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Sec-WebSocket-Origin: http://example.com\r\n\
             Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
             Sec-WebSocket-Protocol: chat, superchat\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_response_without_protocol_or_origin() {
        let response = HandshakeHeaders::parse(b"GET / HTTP/1.1\r\n\r\n").response();
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.contains("Sec-WebSocket-Origin: \r\n"));
        assert!(!text.contains("Sec-WebSocket-Protocol"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_negotiate_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(REQUEST).await.unwrap();

        let headers = negotiate(&mut server, 2048).await.unwrap();
        assert_eq!(headers.resource.as_deref(), Some("/chat"));

        let mut response = vec![0u8; 1024];
        let n = client.read(&mut response).await.unwrap();
        let text = String::from_utf8_lossy(&response[..n]);
        assert!(text.starts_with(RESPONSE_STATUS));
        assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    }

    #[tokio::test]
    async fn test_negotiate_closed_peer() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        let result = negotiate(&mut server, 2048).await;
        assert_eq!(result, Err(Error::ConnectionClosed));
    }
}
