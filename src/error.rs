//! Error types for pwm-link.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::MessageType;

/// Main error type for all link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial port could not be opened or configured.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// JSON serialization/deserialization error (configuration only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No complete frame arrived within the link timeout.
    #[error("Timed out after {0:?} waiting for a frame")]
    Timeout(Duration),

    /// A frame arrived, but not the one the protocol step expected.
    #[error("Expected {expected} frame, received {received}")]
    UnexpectedFrame {
        expected: MessageType,
        received: MessageType,
    },

    /// The type byte does not name a known message type.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    /// Malformed frame (bad length byte, wrong payload size, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Duty cycle, modulation index or frequency outside its valid range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A computed register value does not fit its 8-bit register.
    #[error("Register value {0} outside 0..=255")]
    RegisterOverflow(i64),

    /// A sync was requested while no session is open.
    #[error("Not connected")]
    NotConnected,

    /// Every sync attempt failed.
    #[error("Sync failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The link worker task is no longer running.
    #[error("Link worker stopped")]
    WorkerGone,

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LinkError {
    /// Whether this error means the link itself failed.
    ///
    /// Framing/timeout and transport errors are link failures: they end the
    /// session and are reported to the caller as a failure outcome. Input
    /// and configuration errors are not.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            LinkError::Io(_)
                | LinkError::Serial(_)
                | LinkError::Timeout(_)
                | LinkError::UnexpectedFrame { .. }
                | LinkError::UnknownMessageType(_)
                | LinkError::Protocol(_)
                | LinkError::NotConnected
                | LinkError::RetriesExhausted { .. }
                | LinkError::WorkerGone
        )
    }

    /// Whether this error is a transport-level failure (port vanished, OS error).
    pub fn is_transport(&self) -> bool {
        matches!(self, LinkError::Io(_) | LinkError::Serial(_))
    }
}

/// Result type alias using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_failure_classification() {
        assert!(LinkError::Timeout(Duration::from_millis(500)).is_link_failure());
        assert!(LinkError::UnexpectedFrame {
            expected: MessageType::Ack,
            received: MessageType::Nack,
        }
        .is_link_failure());
        assert!(LinkError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_link_failure());
        assert!(!LinkError::InvalidInput("duty".into()).is_link_failure());
        assert!(!LinkError::Config("baud".into()).is_link_failure());
    }

    #[test]
    fn test_transport_classification() {
        assert!(LinkError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).is_transport());
        assert!(!LinkError::Timeout(Duration::from_millis(1)).is_transport());
    }

    #[test]
    fn test_display_messages() {
        let err = LinkError::UnexpectedFrame {
            expected: MessageType::Sync,
            received: MessageType::Ack,
        };
        assert_eq!(err.to_string(), "Expected SYNC frame, received ACK");
        assert_eq!(
            LinkError::RetriesExhausted { attempts: 5 }.to_string(),
            "Sync failed after 5 attempts"
        );
    }
}
