//! Link module - the background worker that owns the port and the
//! foreground handle that talks to it.
//!
//! - [`worker`] - command loop running the protocol, one command at a time
//! - [`handle`] - non-blocking caller API (`connect`, `sync`, `exit`, `poll`)
//! - [`command`] - the two hand-off message types
//! - [`status`] - operator-visible link status

pub mod command;
pub mod handle;
pub mod status;
pub mod worker;

pub use command::{Command, Outcome};
pub use handle::{ConnectResult, LinkHandle, SyncSubmission};
pub use status::LinkStatus;
pub use worker::{spawn_link_worker, QUEUE_CAPACITY};
