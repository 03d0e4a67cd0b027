//! Test harness for driving a `hybiws` server over real localhost sockets.
//!
//! The server future is not `Send`, so tests run it on the test task and race
//! it against the client side with [`drive`].

#![allow(dead_code)]

mod client;
mod recorder;

use std::future::Future;
use std::time::Duration;

use hybiws::{Handler, Server};

pub use client::{SAMPLE_ACCEPT, SAMPLE_KEY, TestClient};
pub use recorder::{Behavior, Event, FAIL, PANIC, REJECT, Recorder};

/// Upper bound on any single client-side scenario.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Bind a server on an ephemeral localhost port.
pub async fn spawn_server<H: Handler>(handler: H) -> Server<H> {
    Server::bind("127.0.0.1:0", handler)
        .await
        .expect("bind test server")
}

/// Serve until `client` finishes and return its output.
pub async fn drive<H, F>(server: &mut Server<H>, client: F) -> F::Output
where
    H: Handler,
    F: Future,
{
    let scenario = async {
        tokio::select! {
            _ = server.serve() => unreachable!("serve never returns"),
            out = client => out,
        }
    };
    tokio::time::timeout(TIMEOUT, scenario)
        .await
        .expect("scenario timed out")
}

/// Run exactly one readiness pass.
pub async fn turn<H: Handler>(server: &mut Server<H>) -> usize {
    tokio::time::timeout(TIMEOUT, server.turn())
        .await
        .expect("turn timed out")
}
