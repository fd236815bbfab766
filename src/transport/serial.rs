//! Serial port opener.

use tokio_serial::SerialPortBuilderExt;

use super::{DynSerial, PortOpener};
use crate::config::DEFAULT_BAUD_RATE;
use crate::error::Result;

/// Opens serial ports at a fixed baud rate, 8 data bits, no parity, one
/// stop bit.
#[derive(Debug, Clone)]
pub struct SerialOpener {
    baud_rate: u32,
}

impl SerialOpener {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Default for SerialOpener {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE)
    }
}

impl PortOpener for SerialOpener {
    fn open(&mut self, port_name: &str) -> Result<DynSerial> {
        tracing::debug!(port = port_name, baud_rate = self.baud_rate, "opening serial port");
        let port = tokio_serial::new(port_name, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()?;
        Ok(Box::new(port))
    }
}
