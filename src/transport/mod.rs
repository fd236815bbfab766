//! Transport module - how a port name becomes a byte stream.
//!
//! The link worker never touches a serial port directly. It asks a
//! [`PortOpener`] for a [`DynSerial`] and runs the protocol over whatever
//! comes back:
//!
//! - [`SerialOpener`] opens a real serial port (8N1, no flow control)
//! - [`SimulatedOpener`](crate::simulator::SimulatedOpener) hands out
//!   in-memory streams connected to simulated devices

mod serial;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub use serial::SerialOpener;

/// Byte stream a session can run over.
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Boxed port as handed to the link worker.
pub type DynSerial = Box<dyn SerialPortIO>;

/// Opens ports by name.
///
/// Called from the link worker task, once per connect.
pub trait PortOpener: Send + 'static {
    fn open(&mut self, port_name: &str) -> Result<DynSerial>;
}
