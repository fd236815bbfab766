//! Caller-facing link handle.
//!
//! [`LinkHandle`] is what a periodically polling front end talks to. It
//! translates operator setpoints into SYNC payloads, submits commands to
//! the link worker and turns worker outcomes into a [`LinkStatus`].
//!
//! Only `connect` waits for the worker. `sync`, `exit` and `poll` never
//! block: when the command queue is occupied a sync is skipped and an exit
//! is deferred to the next call.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use pwm_link::codec::{ModulationIndexCode, Setpoint};
//! use pwm_link::link::{ConnectResult, LinkHandle, LinkStatus};
//! use pwm_link::simulator::{SimulatedDevice, SimulatedOpener};
//! use pwm_link::LinkConfig;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> pwm_link::Result<()> {
//! let device = SimulatedDevice::inverter(ModulationIndexCode::MAX);
//! let opener = SimulatedOpener::new().with_device("sim0", device);
//! let mut link = LinkHandle::spawn(opener, LinkConfig::new().timeout(Duration::from_millis(200)))?;
//!
//! assert!(matches!(link.connect("sim0").await, ConnectResult::Connected(_)));
//! assert_eq!(link.status(), LinkStatus::Connected);
//!
//! link.sync(Setpoint::Inverter { modulation_index: 0.90 })?;
//! link.exit();
//! link.shutdown().await
//! # }
//! ```

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::command::{Command, Outcome};
use super::status::LinkStatus;
use super::worker::spawn_link_worker;
use crate::codec::Setpoint;
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::transport::{PortOpener, SerialOpener};

/// Result of [`LinkHandle::connect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectResult {
    /// Handshake complete; the device's current setpoint.
    Connected(Setpoint),
    /// Already connected to this port; nothing was sent.
    AlreadyConnected,
    /// Connect failed. [`LinkHandle::status`] is `CouldNotConnectError`.
    Failed,
}

impl ConnectResult {
    /// True unless the connect failed.
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectResult::Failed)
    }
}

/// Result of [`LinkHandle::sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSubmission {
    /// Queued for the worker.
    Submitted,
    /// The previous command has not been picked up yet; skipped.
    Busy,
    /// The link is not connected; skipped.
    NotConnected,
}

/// Foreground handle to a link worker.
pub struct LinkHandle {
    commands: mpsc::Sender<Command>,
    outcomes: mpsc::Receiver<Outcome>,
    status: watch::Sender<LinkStatus>,
    port: Option<String>,
    config: LinkConfig,
    exit_pending: bool,
    worker: JoinHandle<()>,
}

impl LinkHandle {
    /// Spawn a link worker that opens ports with `opener`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<O: PortOpener>(opener: O, config: LinkConfig) -> Result<Self> {
        config.validate()?;

        let (commands, outcomes, worker) = spawn_link_worker(opener, config.clone());
        let (status, _) = watch::channel(LinkStatus::NotConnected);

        Ok(Self {
            commands,
            outcomes,
            status,
            port: None,
            config,
            exit_pending: false,
            worker,
        })
    }

    /// Spawn a link worker over real serial ports.
    pub fn serial(config: LinkConfig) -> Result<Self> {
        let opener = SerialOpener::new(config.baud_rate);
        Self::spawn(opener, config)
    }

    /// Current status.
    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    /// Watch status changes.
    ///
    /// Changes are published when the handle processes outcomes, i.e.
    /// during `connect`, `sync`, `exit` and `poll`.
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status.subscribe()
    }

    /// Port of the current session.
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Configuration the worker was spawned with.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Connect to `port` and return the device's current setpoint.
    ///
    /// No frames are exchanged if already connected to the same port.
    /// Otherwise any session on another port is closed first. Waits for
    /// the worker, which bounds every read with the link timeout.
    pub async fn connect(&mut self, port: &str) -> ConnectResult {
        // A sync failure may be waiting in the queue; apply it before
        // trusting the current status.
        self.drain_outcomes();
        if self.status().is_connected() && self.port.as_deref() == Some(port) {
            return ConnectResult::AlreadyConnected;
        }

        self.set_status(LinkStatus::Connecting);
        self.port = None;

        match self.submit_connect(port).await {
            Ok(ConnectOutcome::Connected(port, setpoint)) => {
                tracing::info!(port = %port, ?setpoint, "link connected");
                self.port = Some(port);
                self.set_status(LinkStatus::Connected);
                ConnectResult::Connected(setpoint)
            }
            Ok(ConnectOutcome::Failed(error)) => {
                tracing::warn!(port, error = %error, "link could not connect");
                self.set_status(LinkStatus::CouldNotConnectError);
                ConnectResult::Failed
            }
            Err(error) => {
                tracing::error!(port, error = %error, "link worker unavailable");
                self.set_status(LinkStatus::CouldNotConnectError);
                ConnectResult::Failed
            }
        }
    }

    async fn submit_connect(&mut self, port: &str) -> Result<ConnectOutcome> {
        if self.exit_pending {
            self.send_draining(Command::Exit).await?;
            self.exit_pending = false;
        }
        self.send_draining(Command::Connect {
            port: port.to_string(),
        })
        .await?;

        loop {
            match self.outcomes.recv().await {
                Some(Outcome::Connected { port, payload }) => {
                    let setpoint = Setpoint::from_payload(&payload, &self.config.profile);
                    return Ok(ConnectOutcome::Connected(port, setpoint));
                }
                Some(Outcome::ConnectFailed { error, .. }) => {
                    return Ok(ConnectOutcome::Failed(error))
                }
                Some(outcome) => self.apply(outcome),
                None => return Err(LinkError::WorkerGone),
            }
        }
    }

    /// Wait for room in the command queue, consuming outcomes meanwhile so
    /// the worker can make progress.
    async fn send_draining(&mut self, command: Command) -> Result<()> {
        loop {
            let received = tokio::select! {
                permit = self.commands.reserve() => {
                    permit.map_err(|_| LinkError::WorkerGone)?.send(command);
                    return Ok(());
                }
                outcome = self.outcomes.recv() => outcome,
            };
            match received {
                Some(outcome) => self.apply(outcome),
                None => return Err(LinkError::WorkerGone),
            }
        }
    }

    /// Submit a new setpoint without waiting.
    ///
    /// The outcome of the previous sync is applied first: a failed sync
    /// moves the status to `TimeoutError`, after which a new `connect` is
    /// required. The call is skipped when the link is not connected or the
    /// previous command is still queued.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the setpoint is outside the profile limits or of
    /// the wrong mode, `WorkerGone` if the worker has stopped.
    pub fn sync(&mut self, setpoint: Setpoint) -> Result<SyncSubmission> {
        self.drain_outcomes();
        self.flush_pending_exit();

        let payload = setpoint.to_payload(self.config.mode, &self.config.profile)?;

        if !self.status().is_connected() {
            return Ok(SyncSubmission::NotConnected);
        }

        match self.commands.try_send(Command::Sync(payload)) {
            Ok(()) => Ok(SyncSubmission::Submitted),
            Err(TrySendError::Full(_)) => {
                tracing::trace!("sync skipped, command queue occupied");
                Ok(SyncSubmission::Busy)
            }
            Err(TrySendError::Closed(_)) => Err(LinkError::WorkerGone),
        }
    }

    /// Apply any pending outcome and return the resulting status.
    pub fn poll(&mut self) -> LinkStatus {
        self.drain_outcomes();
        self.flush_pending_exit();
        self.status()
    }

    /// End the session.
    ///
    /// The status becomes `Disconnected` immediately. The `EXIT` command is
    /// queued for the worker, or deferred to the next call if the queue is
    /// occupied.
    pub fn exit(&mut self) {
        self.drain_outcomes();
        self.set_status(LinkStatus::Disconnected);
        self.port = None;
        self.exit_pending = true;
        self.flush_pending_exit();
    }

    /// Stop the worker and wait for it. An open session gets a best-effort
    /// `EXIT`.
    pub async fn shutdown(self) -> Result<()> {
        let LinkHandle {
            commands,
            outcomes,
            worker,
            ..
        } = self;
        drop(commands);
        drop(outcomes);
        worker.await.map_err(|_| LinkError::WorkerGone)
    }

    fn flush_pending_exit(&mut self) {
        if !self.exit_pending {
            return;
        }
        match self.commands.try_send(Command::Exit) {
            Ok(()) => self.exit_pending = false,
            Err(TrySendError::Full(_)) => {
                tracing::debug!("exit deferred, command queue occupied");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("exit dropped, link worker stopped");
                self.exit_pending = false;
            }
        }
    }

    fn drain_outcomes(&mut self) {
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Synced { attempts } => {
                tracing::trace!(attempts, "sync acknowledged");
            }
            Outcome::SyncFailed { error } => {
                if self.status().is_connected() {
                    tracing::warn!(error = %error, "sync not acknowledged, link lost");
                    self.port = None;
                    self.set_status(LinkStatus::TimeoutError);
                }
            }
            Outcome::Connected { port, .. } | Outcome::ConnectFailed { port, .. } => {
                tracing::debug!(port = %port, "stale connect outcome discarded");
            }
            Outcome::Exited => {}
        }
    }

    fn set_status(&self, status: LinkStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!(from = %previous, to = %status, "link status changed");
        }
    }
}

enum ConnectOutcome {
    Connected(String, Setpoint),
    Failed(LinkError),
}
