//! The readiness multiplexer.
//!
//! [`Server`] owns the listening socket, the connection [`Registry`] and the
//! application [`Handler`]. Everything runs on one task: the readiness poll
//! is the only place the loop waits for new work, and each wake processes
//! every socket that was ready.

mod handler;
mod registry;
#[allow(clippy::module_inception)]
mod server;

pub use handler::Handler;
pub use registry::{ConnectionRecord, Registry};
pub use server::Server;
