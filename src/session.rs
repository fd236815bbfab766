//! Handshake and sync protocol over one open port.
//!
//! A [`Session`] owns the byte stream for one logical session with the
//! device and walks the protocol state machine:
//!
//! ```text
//!          connect()            sync()
//! Idle ──► Connecting ──► Connected ⇄ Syncing
//!  ▲            │              │
//!  └── failure ─┘              └── exit() / retries exhausted / I/O ──► Disconnected
//! ```
//!
//! # Exchanges
//!
//! - **Connect**: host sends `CONN`, device answers `SYNC` with its current
//!   setpoint, host replies `ACK`.
//! - **Sync**: host sends `SYNC` with the new setpoint and waits for `ACK`.
//!   Each attempt that times out or receives anything but `ACK` consumes
//!   one retry.
//! - **Exit**: host sends `EXIT`; no reply is awaited.
//!
//! Every read is bounded by the link timeout. Input left over from an
//! earlier exchange is discarded before each `SYNC` goes out.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{SyncMode, SyncPayload};
use crate::error::{LinkError, Result};
use crate::protocol::{discard_pending, read_frame, write_frame, Frame, MessageType};

/// Protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Port open, no handshake yet (or the last handshake failed).
    Idle,
    /// `CONN` sent, waiting for the device's `SYNC`.
    Connecting,
    /// Handshake complete.
    Connected,
    /// `SYNC` sent, waiting for `ACK`.
    Syncing,
    /// Session over; the port must be reopened.
    Disconnected,
}

/// One protocol session over an owned byte stream.
pub struct Session<S> {
    stream: S,
    port: String,
    timeout: Duration,
    mode: SyncMode,
    state: SessionState,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a freshly opened stream.
    pub fn new(stream: S, port: impl Into<String>, timeout: Duration, mode: SyncMode) -> Self {
        Self {
            stream,
            port: port.into(),
            timeout,
            mode,
            state: SessionState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn port(&self) -> &str {
        &self.port
    }

    #[inline]
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Run the connect handshake and return the device's current setpoint.
    ///
    /// On failure the session is back in `Idle` (or `Disconnected` after a
    /// transport error).
    pub async fn connect(&mut self) -> Result<SyncPayload> {
        if self.state != SessionState::Idle {
            return Err(LinkError::Protocol(format!(
                "Cannot connect from state {:?}",
                self.state
            )));
        }

        self.state = SessionState::Connecting;
        match self.handshake().await {
            Ok(payload) => {
                self.state = SessionState::Connected;
                tracing::debug!(port = %self.port, ?payload, "handshake complete");
                Ok(payload)
            }
            Err(e) => {
                self.state = if e.is_transport() {
                    SessionState::Disconnected
                } else {
                    SessionState::Idle
                };
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<SyncPayload> {
        self.send(Frame::empty(MessageType::Conn)).await?;
        let reply = self.expect(MessageType::Sync).await?;
        let payload = SyncPayload::decode(self.mode, reply.payload())?;
        self.send(Frame::empty(MessageType::Ack)).await?;
        Ok(payload)
    }

    /// Send one `SYNC` and wait for its `ACK`.
    pub async fn sync_once(&mut self, payload: &SyncPayload) -> Result<()> {
        self.check_can_sync(payload)?;

        self.state = SessionState::Syncing;
        let result = self.sync_exchange(payload).await;
        self.state = match &result {
            Err(e) if e.is_transport() => SessionState::Disconnected,
            _ => SessionState::Connected,
        };
        result
    }

    async fn sync_exchange(&mut self, payload: &SyncPayload) -> Result<()> {
        self.discard_stale().await?;
        self.send(Frame::from_parts(MessageType::Sync, &payload.to_bytes()))
            .await?;
        self.expect(MessageType::Ack).await?;
        Ok(())
    }

    /// Sync with up to `attempts` attempts. Returns the number of attempts used.
    ///
    /// When every attempt fails the session becomes `Disconnected` and
    /// `RetriesExhausted` is returned. A transport error ends the session
    /// immediately without further attempts.
    pub async fn sync(&mut self, payload: &SyncPayload, attempts: u32) -> Result<u32> {
        self.check_can_sync(payload)?;

        for attempt in 1..=attempts {
            match self.sync_once(payload).await {
                Ok(()) => return Ok(attempt),
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        port = %self.port,
                        attempt,
                        attempts,
                        error = %e,
                        "sync attempt failed"
                    );
                }
            }
        }

        self.state = SessionState::Disconnected;
        Err(LinkError::RetriesExhausted { attempts })
    }

    fn check_can_sync(&self, payload: &SyncPayload) -> Result<()> {
        if self.state != SessionState::Connected {
            return Err(LinkError::NotConnected);
        }
        if payload.mode() != self.mode {
            return Err(LinkError::InvalidInput(format!(
                "{:?} payload sent to a device in {:?} mode",
                payload.mode(),
                self.mode
            )));
        }
        Ok(())
    }

    /// Send `EXIT`. The session is `Disconnected` afterwards whether or not
    /// the write succeeded.
    pub async fn exit(&mut self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        let result = self.send(Frame::empty(MessageType::Exit)).await;
        self.state = SessionState::Disconnected;
        result
    }

    /// Drop replies to earlier attempts that arrived after their timeout.
    async fn discard_stale(&mut self) -> Result<()> {
        let discarded = discard_pending(&mut self.stream).await?;
        if discarded > 0 {
            tracing::debug!(port = %self.port, bytes = discarded, "discarded stale input");
        }
        Ok(())
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        tracing::debug!(port = %self.port, frame_type = %frame.message_type(), "send");
        write_frame(&mut self.stream, &frame).await
    }

    async fn expect(&mut self, expected: MessageType) -> Result<Frame> {
        let frame = read_frame(&mut self.stream, self.timeout).await?;
        tracing::debug!(port = %self.port, frame_type = %frame.message_type(), "recv");
        if !frame.is(expected) {
            return Err(LinkError::UnexpectedFrame {
                expected,
                received: frame.message_type(),
            });
        }
        Ok(frame)
    }
}
