//! WebSocket protocol core (RFC 6455): frame codec, payload streaming and the
//! opening handshake.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod reader;

pub use frame::{Frame, FrameHeader, IncomingFrame, MAX_PAYLOAD_LEN};
pub use handshake::{
    HandshakeHeaders, HandshakeResponse, RESPONSE_STATUS, WS_GUID, compute_accept_key, negotiate,
};
pub use mask::{apply_mask, apply_mask_at, random_mask};
pub use opcode::OpCode;
pub use reader::PayloadReader;
