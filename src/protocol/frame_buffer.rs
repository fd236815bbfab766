//! Frame buffer for accumulating chunked input.
//!
//! The host side reads frames with [`read_frame`](super::read_frame), which
//! blocks for exactly one frame. A device-side reader (see
//! [`simulator`](crate::simulator)) instead receives arbitrary chunks from
//! the stream and needs to split them into frames. Parsing is a two-state
//! machine:
//! - `WaitingForLength`: need the length byte
//! - `WaitingForBody`: length known, need N more bytes (type + payload)
//!
//! # Example
//!
//! ```
//! use pwm_link::protocol::{FrameBuffer, MessageType};
//!
//! let mut buffer = FrameBuffer::new();
//! assert!(buffer.push(&[2, 4]).unwrap().is_empty());
//!
//! let frames = buffer.push(&[15, 1, 8]).unwrap();
//! assert_eq!(frames.len(), 2);
//! assert!(frames[0].is(MessageType::Sync));
//! assert!(frames[1].is(MessageType::Exit));
//! ```

use bytes::BytesMut;

use super::wire_format::LENGTH_PREFIX_SIZE;
use super::Frame;
use crate::error::{LinkError, Result};

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForLength,
    WaitingForBody { remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
}

impl FrameBuffer {
    /// Create a new, empty frame buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(64),
            state: State::WaitingForLength,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial frames stay buffered until the next push.
    ///
    /// # Errors
    ///
    /// Returns a protocol error on a zero length byte and an
    /// `UnknownMessageType` error on an unknown type byte. The offending
    /// frame is consumed, so the buffer stays aligned on frame boundaries.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::WaitingForLength => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }

                let len = self.buffer.split_to(LENGTH_PREFIX_SIZE)[0] as usize;
                if len == 0 {
                    return Err(LinkError::Protocol(
                        "Length byte 0 leaves no room for a type byte".to_string(),
                    ));
                }

                self.state = State::WaitingForBody { remaining: len };
                self.try_extract_one()
            }

            State::WaitingForBody { remaining } => {
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let body = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForLength;
                Frame::decode_body(&body).map(Some)
            }
        }
    }

    /// Number of buffered bytes not yet part of a frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForLength => "WaitingForLength",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
