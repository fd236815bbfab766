//! Link status as shown to the operator.

use std::fmt;

/// Observable state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkStatus {
    /// No port has been connected yet.
    #[default]
    NotConnected,
    /// A `connect` is in progress.
    Connecting,
    /// Handshake completed, setpoints can be sent.
    Connected,
    /// The operator ended the session.
    Disconnected,
    /// The device stopped acknowledging setpoints.
    TimeoutError,
    /// The port could not be opened or the device did not answer `CONN`.
    CouldNotConnectError,
}

impl LinkStatus {
    /// Whether setpoints can be sent.
    #[inline]
    pub fn is_connected(self) -> bool {
        self == LinkStatus::Connected
    }

    /// Whether the link was lost or never came up.
    #[inline]
    pub fn is_error(self) -> bool {
        matches!(
            self,
            LinkStatus::TimeoutError | LinkStatus::CouldNotConnectError
        )
    }

    /// Operator-facing text.
    pub fn description(self) -> &'static str {
        match self {
            LinkStatus::NotConnected => "Not connected",
            LinkStatus::Connecting => "Connecting",
            LinkStatus::Connected => "Connected",
            LinkStatus::Disconnected => "Disconnected",
            LinkStatus::TimeoutError => "Timeout error",
            LinkStatus::CouldNotConnectError => "Could not connect error",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
