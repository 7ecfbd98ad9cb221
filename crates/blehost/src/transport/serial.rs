//! Serial (UART) transport
//!
//! Opens the controller's serial port at 1 Mbaud, 8N1, and forwards every
//! received byte.

use super::constants::SERIAL_BAUD_RATE;
use super::{ByteSink, DeviceSelector, Transport};
use crate::error::TransportError;
use log::{debug, trace};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

const READ_BUFFER_SIZE: usize = 1024;

/// Wait per read attempt when the caller asks to wait forever; the port
/// lock is released between attempts.
const IDLE_READ_SLICE: Duration = Duration::from_millis(100);

pub struct SerialTransport {
    baud_rate: u32,
    port: Mutex<Option<Box<dyn SerialPort>>>,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self::with_baud_rate(SERIAL_BAUD_RATE)
    }

    pub fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            port: Mutex::new(None),
        }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn lock_port(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn SerialPort>>> {
        self.port.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One read of up to `wait`; a timeout yields 0 bytes.
    fn read_once(&self, buffer: &mut [u8], wait: Duration) -> Result<usize, TransportError> {
        let mut guard = self.lock_port();
        let port = guard.as_mut().ok_or(TransportError::Closed)?;
        port.set_timeout(wait)?;
        match port.read(buffer) {
            Ok(len) => Ok(len),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(TransportError::Read(e)),
        }
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Transport for SerialTransport {
    fn init(&self, selector: &DeviceSelector) -> Result<(), TransportError> {
        let DeviceSelector::Serial(path) = selector else {
            return Err(TransportError::UnsupportedSelector(selector.to_string()));
        };

        let port = serialport::new(path.as_str(), self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()?;

        *self.lock_port() = Some(port);
        debug!("opened {} at {} baud", path, self.baud_rate);
        Ok(())
    }

    fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.lock_port();
        let port = guard.as_mut().ok_or(TransportError::Closed)?;
        trace!("> {}", hex::encode(bytes));
        port.write_all(bytes).map_err(TransportError::Write)?;
        port.flush().map_err(TransportError::Write)
    }

    fn poll(&self, sink: &mut dyn ByteSink, timeout: Option<Duration>) -> Result<usize, TransportError> {
        let mut buffer = [0u8; READ_BUFFER_SIZE];

        // The port lock is released before the sink runs, so the layer above
        // may write in response.
        let len = match timeout {
            Some(timeout) => self.read_once(&mut buffer, timeout)?,
            None => loop {
                let len = self.read_once(&mut buffer, IDLE_READ_SLICE)?;
                if len > 0 {
                    break len;
                }
            },
        };

        if len > 0 {
            trace!("< {}", hex::encode(&buffer[..len]));
            sink.receive(&buffer[..len], 0, len);
        }
        Ok(len)
    }

    fn is_open(&self) -> bool {
        self.lock_port().is_some()
    }

    fn close(&self) {
        if self.lock_port().take().is_some() {
            debug!("closed serial port");
        }
    }
}
