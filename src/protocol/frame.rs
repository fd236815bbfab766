//! Frame struct and encoding.
//!
//! A [`Frame`] is one length-prefixed protocol message. Payloads use
//! `bytes::Bytes` so frames can be cloned into logs and simulator
//! transcripts without copying.
//!
//! # Example
//!
//! ```
//! use pwm_link::protocol::{encode, Frame, MessageType};
//!
//! let bytes = encode(MessageType::Sync, &[15]).unwrap();
//! assert_eq!(bytes, vec![2, 4, 15]);
//!
//! let frame = Frame::decode_body(&bytes[1..]).unwrap();
//! assert_eq!(frame.message_type(), MessageType::Sync);
//! assert_eq!(frame.payload(), &[15]);
//! ```

use bytes::Bytes;

use super::wire_format::{length_byte, MessageType, LENGTH_PREFIX_SIZE};
use crate::error::{LinkError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind.
    pub message_type: MessageType,
    /// Payload bytes (empty for everything except SYNC).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from type and payload.
    pub fn new(message_type: MessageType, payload: Bytes) -> Self {
        Self {
            message_type,
            payload,
        }
    }

    /// Create a frame with no payload.
    pub fn empty(message_type: MessageType) -> Self {
        Self::new(message_type, Bytes::new())
    }

    /// Create a frame copying the payload from a slice.
    pub fn from_parts(message_type: MessageType, payload: &[u8]) -> Self {
        Self::new(message_type, Bytes::copy_from_slice(payload))
    }

    /// Frame kind.
    #[inline]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Payload bytes following the type byte.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether this frame is of `message_type`.
    #[inline]
    pub fn is(&self, message_type: MessageType) -> bool {
        self.message_type == message_type
    }

    /// Decode a frame body (type byte + payload), i.e. everything after the
    /// length byte.
    pub fn decode_body(body: &[u8]) -> Result<Self> {
        let (&type_byte, payload) = body
            .split_first()
            .ok_or_else(|| LinkError::Protocol("Frame body is empty".to_string()))?;
        let message_type = MessageType::try_from(type_byte)?;
        if payload.len() > message_type.max_payload_len() {
            return Err(LinkError::Protocol(format!(
                "{} frame carries {} payload bytes, at most {} allowed",
                message_type,
                payload.len(),
                message_type.max_payload_len()
            )));
        }
        Ok(Self::from_parts(message_type, payload))
    }

    /// Encode this frame to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.message_type, &self.payload)
    }
}

/// Encode a frame as `[length][type][payload...]`.
///
/// The length byte is `1 + payload.len()`.
pub fn encode(message_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
    let len = length_byte(payload.len())?;
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + len as usize);
    buf.push(len);
    buf.push(message_type.as_u8());
    buf.extend_from_slice(payload);
    Ok(buf)
}
