//! Messages exchanged between a [`LinkHandle`](super::LinkHandle) and its
//! worker.

use crate::codec::SyncPayload;
use crate::error::LinkError;

/// Request sent to the link worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open `port` and run the connect handshake.
    Connect { port: String },
    /// Send a new setpoint to the connected device.
    Sync(SyncPayload),
    /// End the session and close the port.
    Exit,
}

impl Command {
    /// Short name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Connect { .. } => "connect",
            Command::Sync(_) => "sync",
            Command::Exit => "exit",
        }
    }
}

/// Result of one command, reported back by the link worker.
#[derive(Debug)]
pub enum Outcome {
    /// Handshake complete; `payload` is the device's current setpoint.
    Connected { port: String, payload: SyncPayload },
    /// The port could not be opened or the handshake failed.
    ConnectFailed { port: String, error: LinkError },
    /// The device acknowledged the setpoint.
    Synced { attempts: u32 },
    /// The setpoint was not acknowledged.
    SyncFailed { error: LinkError },
    /// The session is closed.
    Exited,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ModulationIndexCode;

    #[test]
    fn test_command_names() {
        let sync = Command::Sync(SyncPayload::Modulation(ModulationIndexCode::MAX));
        assert_eq!(sync.name(), "sync");
        assert_eq!(Command::Exit.name(), "exit");
        assert_eq!(
            Command::Connect {
                port: "COM3".into()
            }
            .name(),
            "connect"
        );
    }
}
