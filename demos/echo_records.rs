//! Echo server that also understands comma-separated records.
//!
//! Text frames are echoed back. Binary frames are read line by line straight
//! off the socket; every line is split into fields and sent back as a JSON
//! array, followed by a final `parse success` text frame.
//!
//! Run with: `cargo run --example echo_records -- 127.0.0.1:9999`
//! Set `RUST_LOG=hybiws=trace` to see every frame.

use hybiws::{Connection, Handler, HandshakeHeaders, IncomingFrame, Result, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:9999";

struct EchoRecords;

impl Handler for EchoRecords {
    async fn open(&mut self, conn: &mut Connection<'_>, headers: &HandshakeHeaders) -> Result<()> {
        info!(
            peer = conn.peer_id(),
            resource = ?headers.resource,
            origin = ?headers.origin,
            "connected"
        );
        Ok(())
    }

    async fn receive(
        &mut self,
        conn: &mut Connection<'_>,
        frame: &mut IncomingFrame<'_>,
    ) -> Result<()> {
        if frame.is_text() {
            let text = frame.text().await?;
            conn.send(&text).await?;
            info!(peer = conn.peer_id(), len = text.len(), "sent echo");
            return Ok(());
        }

        let mut pending = Vec::new();
        let mut records = 0usize;
        while let Some(chunk) = frame.reader().read_chunk(1024).await? {
            pending.extend_from_slice(&chunk);
            while let Some(end) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=end).collect();
                records += send_record(conn, &line).await?;
            }
        }
        records += send_record(conn, &pending).await?;

        conn.send("parse success").await?;
        info!(peer = conn.peer_id(), records, "parsed records");
        Ok(())
    }

    async fn close(&mut self, conn: &mut Connection<'_>) -> Result<()> {
        info!(peer = conn.peer_id(), "closed");
        Ok(())
    }
}

/// Send one line as a JSON array. Blank lines are skipped.
async fn send_record(conn: &mut Connection<'_>, line: &[u8]) -> Result<usize> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Ok(0);
    }
    let json = serde_json::to_string(&split_fields(line)).map_err(hybiws::Error::handler)?;
    conn.send(&json).await?;
    Ok(1)
}

/// Split a comma-separated line. Fields may be wrapped in double quotes, with
/// `""` standing for a literal quote.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let mut server = Server::bind(addr.as_str(), EchoRecords).await?;
    info!(addr = %server.local_addr()?, "echo_records ready");
    server.serve().await;
    Ok(())
}
