//! Wire format constants and the message-type vocabulary.
//!
//! Every frame on the serial link has the layout:
//! ```text
//! ┌──────────┬──────────┬──────────────────┐
//! │ Length   │ Type     │ Payload          │
//! │ 1 byte   │ 1 byte   │ 0-3 bytes        │
//! │ 1 + len  │ 1..=8    │ type-dependent   │
//! └──────────┴──────────┴──────────────────┘
//! ```
//!
//! The length byte counts the type byte plus the payload, so the smallest
//! valid frame (`CONN`, `ACK`, `EXIT`, ...) is `[0x01, type]`.

use std::fmt;

use crate::error::{LinkError, Result};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 1;

/// Size of the type byte.
pub const TYPE_SIZE: usize = 1;

/// Largest payload the length byte can describe (255 - type byte).
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize - TYPE_SIZE;

/// Largest payload any message type of this protocol actually carries.
pub const MAX_PROTOCOL_PAYLOAD: usize = 3;

/// Protocol frame kinds.
///
/// The discriminants are transmitted as raw bytes and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Host requests a session.
    Conn = 1,
    /// Positive acknowledgment.
    Ack = 2,
    /// Negative acknowledgment.
    Nack = 3,
    /// Setpoint exchange (modulation code or register triple).
    Sync = 4,
    /// Keep-alive.
    Alive = 5,
    /// Device asks the host for the current setpoint.
    Fetch = 6,
    /// Device is ready.
    Ready = 7,
    /// Host ends the session.
    Exit = 8,
}

impl MessageType {
    /// All message types, in wire order.
    pub const ALL: [MessageType; 8] = [
        MessageType::Conn,
        MessageType::Ack,
        MessageType::Nack,
        MessageType::Sync,
        MessageType::Alive,
        MessageType::Fetch,
        MessageType::Ready,
        MessageType::Exit,
    ];

    /// The byte transmitted for this type.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Upper-case protocol name (`"SYNC"`, `"ACK"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Conn => "CONN",
            MessageType::Ack => "ACK",
            MessageType::Nack => "NACK",
            MessageType::Sync => "SYNC",
            MessageType::Alive => "ALIVE",
            MessageType::Fetch => "FETCH",
            MessageType::Ready => "READY",
            MessageType::Exit => "EXIT",
        }
    }

    /// Largest payload this type may carry.
    pub fn max_payload_len(self) -> usize {
        match self {
            MessageType::Sync => MAX_PROTOCOL_PAYLOAD,
            _ => 0,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = LinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(MessageType::Conn),
            2 => Ok(MessageType::Ack),
            3 => Ok(MessageType::Nack),
            4 => Ok(MessageType::Sync),
            5 => Ok(MessageType::Alive),
            6 => Ok(MessageType::Fetch),
            7 => Ok(MessageType::Ready),
            8 => Ok(MessageType::Exit),
            other => Err(LinkError::UnknownMessageType(other)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Length byte for a frame carrying `payload_len` payload bytes.
///
/// Returns an error if the payload does not fit the single length byte.
pub fn length_byte(payload_len: usize) -> Result<u8> {
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(LinkError::Protocol(format!(
            "Payload size {} exceeds maximum {}",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok((TYPE_SIZE + payload_len) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminants_are_stable() {
        let bytes: Vec<u8> = MessageType::ALL.iter().map(|t| t.as_u8()).collect();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_try_from_every_known_byte() {
        for t in MessageType::ALL {
            assert_eq!(MessageType::try_from(t.as_u8()).unwrap(), t);
        }
    }

    #[test]
    fn test_try_from_unknown_byte() {
        assert!(matches!(
            MessageType::try_from(0),
            Err(LinkError::UnknownMessageType(0))
        ));
        assert!(matches!(
            MessageType::try_from(9),
            Err(LinkError::UnknownMessageType(9))
        ));
    }

    #[test]
    fn test_length_byte() {
        assert_eq!(length_byte(0).unwrap(), 1);
        assert_eq!(length_byte(3).unwrap(), 4);
        assert_eq!(length_byte(MAX_PAYLOAD_SIZE).unwrap(), 255);
        assert!(length_byte(MAX_PAYLOAD_SIZE + 1).is_err());
    }

    #[test]
    fn test_only_sync_carries_payload() {
        assert_eq!(MessageType::Sync.max_payload_len(), 3);
        assert_eq!(MessageType::Conn.max_payload_len(), 0);
        assert_eq!(MessageType::Exit.max_payload_len(), 0);
    }

    #[test]
    fn test_display_uses_protocol_name() {
        assert_eq!(MessageType::Conn.to_string(), "CONN");
        assert_eq!(format!("{}", MessageType::Exit), "EXIT");
    }
}
