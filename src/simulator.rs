//! Simulated device for tests and demos.
//!
//! [`SimulatedDevice`] plays the microcontroller side of the protocol:
//!
//! - `CONN` → replies `SYNC` carrying its current setpoint
//! - `SYNC` → stores the new setpoint, replies `ACK`
//! - `ACK` → ignored (end of the connect handshake)
//! - `EXIT` → ends the session
//! - anything else → `NACK`
//!
//! Faults can be injected to exercise the host's timeout, retry and
//! port-loss paths.
//! The device records every frame it receives.
//!
//! [`SimulatedOpener`] is a [`PortOpener`] that wires a fresh in-memory
//! stream to a named device on every open.
//!
//! # Example
//!
//! ```
//! use pwm_link::codec::ModulationIndexCode;
//! use pwm_link::simulator::{SimulatedDevice, SimulatedOpener};
//!
//! let device = SimulatedDevice::inverter(ModulationIndexCode::MAX).drop_sync_acks(2);
//! let opener = SimulatedOpener::new().with_device("sim0", device.clone());
//! assert_eq!(opener.opens(), 0);
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite};

use crate::codec::{ConverterRegisters, ModulationIndexCode, SyncPayload};
use crate::error::Result;
use crate::protocol::{write_frame, Frame, FrameBuffer, MessageType};
use crate::transport::{DynSerial, PortOpener};

/// Buffer size of each simulated port.
const PORT_BUFFER_SIZE: usize = 256;

/// Injected misbehaviour.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Never reply to anything.
    pub silent: bool,
    /// Ignore this many upcoming `SYNC` frames.
    pub drop_sync_acks: u32,
    /// Reply `NACK` to every `SYNC`.
    pub nack_sync: bool,
    /// Reply `ACK` instead of `SYNC` to `CONN`.
    pub wrong_connect_reply: bool,
    /// Delay before each `ACK` to a `SYNC`.
    pub ack_delay: Duration,
    /// Close the port on the next `SYNC` instead of replying.
    pub hang_up_on_sync: bool,
}

/// What the device does after receiving a frame.
#[derive(Debug)]
enum Response {
    Ignore,
    Reply(Frame, Duration),
    HangUp,
}

#[derive(Debug)]
struct DeviceState {
    setpoint: SyncPayload,
    faults: Faults,
    received: Vec<Frame>,
    sessions: usize,
}

/// Shared handle to a simulated device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatedDevice {
    /// A device reporting `setpoint` on connect, with no faults.
    pub fn new(setpoint: SyncPayload) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                setpoint,
                faults: Faults::default(),
                received: Vec::new(),
                sessions: 0,
            })),
        }
    }

    /// An inverter reporting `code` on connect.
    pub fn inverter(code: ModulationIndexCode) -> Self {
        Self::new(SyncPayload::Modulation(code))
    }

    /// A DC-DC converter reporting `registers` on connect.
    pub fn converter(registers: ConverterRegisters) -> Self {
        Self::new(SyncPayload::Registers(registers))
    }

    /// Record frames but never reply.
    pub fn silent(self) -> Self {
        self.lock().faults.silent = true;
        self
    }

    /// Leave the next `count` `SYNC` frames unanswered, so each of those
    /// host attempts times out. Later frames are handled normally.
    pub fn drop_sync_acks(self, count: u32) -> Self {
        self.lock().faults.drop_sync_acks = count;
        self
    }

    /// Reply `NACK` to every `SYNC`.
    pub fn nack_sync(self) -> Self {
        self.lock().faults.nack_sync = true;
        self
    }

    /// Answer `CONN` with `ACK`.
    pub fn wrong_connect_reply(self) -> Self {
        self.lock().faults.wrong_connect_reply = true;
        self
    }

    /// Hold each `ACK` to a `SYNC` back by `delay`.
    pub fn ack_delay(self, delay: Duration) -> Self {
        self.lock().faults.ack_delay = delay;
        self
    }

    /// Drop the connection when the next `SYNC` arrives.
    pub fn hang_up_on_sync(self) -> Self {
        self.lock().faults.hang_up_on_sync = true;
        self
    }

    /// Replace the fault set of a running device.
    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    /// Current setpoint.
    pub fn setpoint(&self) -> SyncPayload {
        self.lock().setpoint
    }

    /// Every frame received so far, across sessions.
    pub fn received(&self) -> Vec<Frame> {
        self.lock().received.clone()
    }

    /// Types of every frame received so far.
    pub fn received_types(&self) -> Vec<MessageType> {
        self.lock()
            .received
            .iter()
            .map(Frame::message_type)
            .collect()
    }

    /// Number of received frames of `message_type`.
    pub fn count(&self, message_type: MessageType) -> usize {
        self.lock()
            .received
            .iter()
            .filter(|f| f.is(message_type))
            .count()
    }

    /// Number of sessions served.
    pub fn sessions(&self) -> usize {
        self.lock().sessions
    }

    /// Wait until at least `n` frames of `message_type` have arrived, or
    /// about two seconds have passed.
    pub async fn wait_for(&self, message_type: MessageType, n: usize) {
        for _ in 0..200 {
            if self.count(message_type) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve one session over `stream` until `EXIT` or end of stream.
    pub async fn serve<S>(&self, mut stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.lock().sessions += 1;

        let mut decoder = FrameBuffer::new();
        let mut buf = [0u8; 64];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }

            let frames = match decoder.push(&buf[..n]) {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::debug!(error = %e, "simulator dropped malformed input");
                    decoder.clear();
                    write_frame(&mut stream, &Frame::empty(MessageType::Nack)).await?;
                    continue;
                }
            };

            for frame in frames {
                match self.handle(&frame) {
                    Response::Ignore => {}
                    Response::Reply(reply, delay) => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        write_frame(&mut stream, &reply).await?;
                    }
                    Response::HangUp => return Ok(()),
                }
            }
        }
    }

    fn handle(&self, frame: &Frame) -> Response {
        let mut state = self.lock();
        state.received.push(frame.clone());

        let nack = Response::Reply(Frame::empty(MessageType::Nack), Duration::ZERO);
        match frame.message_type() {
            MessageType::Exit => Response::HangUp,
            _ if state.faults.silent => Response::Ignore,
            MessageType::Conn if state.faults.wrong_connect_reply => {
                Response::Reply(Frame::empty(MessageType::Ack), Duration::ZERO)
            }
            MessageType::Conn => Response::Reply(
                Frame::from_parts(MessageType::Sync, &state.setpoint.to_bytes()),
                Duration::ZERO,
            ),
            MessageType::Sync => {
                if state.faults.hang_up_on_sync {
                    state.faults.hang_up_on_sync = false;
                    return Response::HangUp;
                }
                if state.faults.drop_sync_acks > 0 {
                    state.faults.drop_sync_acks -= 1;
                    return Response::Ignore;
                }
                if state.faults.nack_sync {
                    return nack;
                }
                match SyncPayload::decode(state.setpoint.mode(), frame.payload()) {
                    Ok(payload) => {
                        state.setpoint = payload;
                        Response::Reply(Frame::empty(MessageType::Ack), state.faults.ack_delay)
                    }
                    Err(_) => nack,
                }
            }
            MessageType::Ack => Response::Ignore,
            _ => nack,
        }
    }
}

/// Opens simulated devices by port name.
#[derive(Debug, Clone, Default)]
pub struct SimulatedOpener {
    devices: HashMap<String, SimulatedDevice>,
    opens: Arc<AtomicUsize>,
}

impl SimulatedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `device` under `port_name`.
    pub fn with_device(mut self, port_name: impl Into<String>, device: SimulatedDevice) -> Self {
        self.devices.insert(port_name.into(), device);
        self
    }

    /// Names of attached ports, sorted.
    pub fn port_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of successful opens, shared between clones.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Acquire)
    }
}

impl PortOpener for SimulatedOpener {
    fn open(&mut self, port_name: &str) -> Result<DynSerial> {
        let device = self.devices.get(port_name).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No simulated device on {port_name}"),
            )
        })?;

        let (host, device_side) = duplex(PORT_BUFFER_SIZE);
        let port = port_name.to_string();
        tokio::spawn(async move {
            if let Err(e) = device.serve(device_side).await {
                tracing::debug!(port = %port, error = %e, "simulated session ended");
            }
        });

        self.opens.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(host))
    }
}
