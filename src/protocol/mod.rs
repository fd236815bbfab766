//! Protocol module - wire format, framing, and frame I/O.
//!
//! This module implements the byte-level protocol of the serial link:
//! - `[length][type][payload...]` frame encoding
//! - Message-type vocabulary (`CONN`, `ACK`, `SYNC`, `EXIT`, ...)
//! - Timeout-bounded frame reads for the host side
//! - Frame buffer for chunked reads on the device side

mod frame;
mod frame_buffer;
mod reader;
mod wire_format;

pub use frame::{encode, Frame};
pub use frame_buffer::FrameBuffer;
pub use reader::{discard_pending, read_frame, write_frame};
pub use wire_format::{
    length_byte, MessageType, LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE, MAX_PROTOCOL_PAYLOAD,
    TYPE_SIZE,
};
