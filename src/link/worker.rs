//! Link worker task.
//!
//! The worker is the only owner of the port. It takes [`Command`]s one at a
//! time from a capacity-1 queue, runs the matching protocol exchange to
//! completion and pushes exactly one [`Outcome`] per command into a second
//! capacity-1 queue.
//!
//! ```text
//! LinkHandle ─► mpsc<Command>(1) ─► Worker ─► Session ─► port
//!     ▲                               │
//!     └──────── mpsc<Outcome>(1) ◄────┘
//! ```
//!
//! Errors never leave the loop: every failure becomes an [`Outcome`].
//! The loop ends when the command sender is dropped or the outcome
//! receiver is gone, closing any open session with a best-effort `EXIT`.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::command::{Command, Outcome};
use crate::codec::SyncPayload;
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::session::Session;
use crate::transport::{DynSerial, PortOpener};

/// Capacity of both hand-off queues.
pub const QUEUE_CAPACITY: usize = 1;

/// Spawn the link worker.
///
/// Returns the command sender, the outcome receiver and the task handle.
pub fn spawn_link_worker<O>(
    opener: O,
    config: LinkConfig,
) -> (
    mpsc::Sender<Command>,
    mpsc::Receiver<Outcome>,
    JoinHandle<()>,
)
where
    O: PortOpener,
{
    let (command_tx, command_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (outcome_tx, outcome_rx) = mpsc::channel(QUEUE_CAPACITY);

    let worker = LinkWorker {
        opener,
        config,
        session: None,
    };
    let span = tracing::info_span!("link_worker");
    let task = tokio::spawn(worker.run(command_rx, outcome_tx).instrument(span));

    (command_tx, outcome_rx, task)
}

struct LinkWorker<O> {
    opener: O,
    config: LinkConfig,
    session: Option<Session<DynSerial>>,
}

impl<O: PortOpener> LinkWorker<O> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        outcomes: mpsc::Sender<Outcome>,
    ) {
        while let Some(command) = commands.recv().await {
            tracing::debug!(command = command.name(), "command received");
            let outcome = self.execute(command).await;
            if outcomes.send(outcome).await.is_err() {
                break;
            }
        }

        self.close_session().await;
        tracing::debug!("link worker stopped");
    }

    async fn execute(&mut self, command: Command) -> Outcome {
        match command {
            Command::Connect { port } => self.connect(port).await,
            Command::Sync(payload) => self.sync(payload).await,
            Command::Exit => {
                self.close_session().await;
                Outcome::Exited
            }
        }
    }

    async fn connect(&mut self, port: String) -> Outcome {
        self.close_session().await;

        let stream = match self.opener.open(&port) {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(port = %port, error = %error, "failed to open port");
                return Outcome::ConnectFailed { port, error };
            }
        };

        let mut session = Session::new(stream, port.clone(), self.config.timeout, self.config.mode);
        match session.connect().await {
            Ok(payload) => {
                tracing::info!(port = %port, ?payload, "connected");
                self.session = Some(session);
                Outcome::Connected { port, payload }
            }
            Err(error) => {
                tracing::warn!(port = %port, error = %error, "connect handshake failed");
                Outcome::ConnectFailed { port, error }
            }
        }
    }

    async fn sync(&mut self, payload: SyncPayload) -> Outcome {
        let Some(session) = self.session.as_mut() else {
            return Outcome::SyncFailed {
                error: LinkError::NotConnected,
            };
        };

        match session.sync(&payload, self.config.sync_attempts).await {
            Ok(attempts) => Outcome::Synced { attempts },
            Err(error) => {
                if error.is_transport() {
                    tracing::error!(port = %session.port(), error = %error, "transport failure");
                } else {
                    tracing::warn!(port = %session.port(), error = %error, "sync failed");
                }
                if error.is_link_failure() {
                    self.session = None;
                }
                Outcome::SyncFailed { error }
            }
        }
    }

    async fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.exit().await {
                tracing::debug!(port = %session.port(), error = %e, "EXIT not delivered");
            }
            tracing::info!(port = %session.port(), "session closed");
        }
    }
}
