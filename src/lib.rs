//! # pwm-link
//!
//! Host-side serial link to a PWM inverter or DC-DC converter prototype.
//!
//! The crate keeps a microcontroller in step with operator setpoints
//! (modulation index, or switching frequency and duty cycle) over a small
//! framed protocol on a serial port.
//!
//! ## Architecture
//!
//! - **Codec**: setpoints ⇄ register values (`PR2`, `CCPRxL`, `CCPxCON`,
//!   modulation code)
//! - **Protocol**: `[length][type][payload]` frames
//! - **Session**: `CONN`/`SYNC`/`ACK`/`EXIT` handshake with timeouts and
//!   bounded retries
//! - **Link**: a worker task that owns the port, and a non-blocking
//!   [`LinkHandle`] for the caller, joined by two capacity-1 queues
//!
//! ## Example
//!
//! ```ignore
//! use pwm_link::{LinkConfig, LinkHandle, Setpoint};
//!
//! #[tokio::main]
//! async fn main() -> pwm_link::Result<()> {
//!     let mut link = LinkHandle::serial(LinkConfig::new())?;
//!     link.connect("/dev/ttyUSB0").await;
//!
//!     loop {
//!         link.sync(Setpoint::Inverter { modulation_index: 0.90 })?;
//!         tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     }
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod session;
pub mod simulator;
pub mod transport;

pub use codec::{Setpoint, SyncMode, SyncPayload};
pub use config::{DeviceProfile, LinkConfig};
pub use error::{LinkError, Result};
pub use link::{ConnectResult, LinkHandle, LinkStatus, SyncSubmission};
