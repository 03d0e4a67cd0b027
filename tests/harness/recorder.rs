//! A handler that records every callback.

use hybiws::{
    Connection, Error, Handler, HandshakeHeaders, IncomingFrame, OpCode, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open { resource: Option<String>, key: Option<String> },
    Receive { opcode: OpCode, len: u64, data: Vec<u8> },
    Close,
}

/// How `receive` treats the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Read the payload whole and send it back with the same opcode.
    Echo,
    /// Read through the stream reader with a buffer of this size; no reply.
    Stream(usize),
    /// Leave the payload unread.
    Ignore,
}

/// Payload that makes `receive` return an error.
pub const FAIL: &[u8] = b"fail";

/// Payload that makes `receive` panic.
pub const PANIC: &[u8] = b"panic";

/// Resource that makes `open` return an error.
pub const REJECT: &str = "/reject";

#[derive(Debug)]
pub struct Recorder {
    pub behavior: Behavior,
    pub events: Vec<Event>,
    /// Socket reads per streamed frame.
    pub reads: Vec<usize>,
}

impl Recorder {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            events: Vec::new(),
            reads: Vec::new(),
        }
    }

    pub fn opens(&self) -> usize {
        self.count(|e| matches!(e, Event::Open { .. }))
    }

    pub fn closes(&self) -> usize {
        self.count(|e| matches!(e, Event::Close))
    }

    pub fn received(&self) -> Vec<(OpCode, Vec<u8>)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Receive { opcode, data, .. } => Some((*opcode, data.clone())),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Handler for Recorder {
    async fn open(&mut self, _conn: &mut Connection<'_>, headers: &HandshakeHeaders) -> Result<()> {
        self.events.push(Event::Open {
            resource: headers.resource.clone(),
            key: headers.key.clone(),
        });
        if headers.resource.as_deref() == Some(REJECT) {
            return Err(Error::handler("rejected resource"));
        }
        Ok(())
    }

    async fn receive(
        &mut self,
        conn: &mut Connection<'_>,
        frame: &mut IncomingFrame<'_>,
    ) -> Result<()> {
        let opcode = frame.opcode()?;
        let len = frame.len();

        let data = match self.behavior {
            Behavior::Echo => frame.payload().await?,
            Behavior::Stream(chunk) => {
                let mut buf = vec![0u8; chunk];
                let mut data = Vec::new();
                let mut reads = 0;
                loop {
                    let n = frame.reader().read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    reads += 1;
                    data.extend_from_slice(&buf[..n]);
                }
                assert!(frame.reader().is_eof());
                self.reads.push(reads);
                data
            }
            Behavior::Ignore => Vec::new(),
        };

        self.events.push(Event::Receive {
            opcode,
            len,
            data: data.clone(),
        });

        if data == FAIL {
            return Err(Error::handler("refusing payload"));
        }
        if data == PANIC {
            panic!("handler blew up");
        }

        if self.behavior == Behavior::Echo {
            match opcode {
                OpCode::Text => conn.send(&String::from_utf8_lossy(&data)).await?,
                _ => conn.send_binary(&data).await?,
            }
        }
        Ok(())
    }

    async fn close(&mut self, _conn: &mut Connection<'_>) -> Result<()> {
        self.events.push(Event::Close);
        Ok(())
    }
}
