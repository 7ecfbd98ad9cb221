//! HCI transport adapters
//!
//! Both adapters present the controller as a plain byte stream: outbound
//! bytes are written unmodified, and every inbound chunk is handed upward as
//! it arrives. Splitting the stream into HCI packets is left to the layer
//! above.

pub mod constants;
pub mod filter;
pub mod serial;
pub mod socket;


use crate::error::TransportError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use filter::HciFilter;
pub use serial::SerialTransport;
pub use socket::HciSocketTransport;

/// Receiver of inbound transport bytes
pub trait ByteSink {
    /// `data[offset..offset + len]` is the newly received chunk.
    fn receive(&mut self, data: &[u8], offset: usize, len: usize);
}

impl<F> ByteSink for F
where
    F: FnMut(&[u8], usize, usize),
{
    fn receive(&mut self, data: &[u8], offset: usize, len: usize) {
        self(data, offset, len)
    }
}

/// Names the device a transport opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// HCI device index, `hciN`
    Hci(u16),
    /// Serial port path
    Serial(String),
}

impl FromStr for DeviceSelector {
    type Err = TransportError;

    /// Accepts `hciN`, a bare index, or a serial port path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransportError::InvalidSelector(s.to_string()));
        }

        let index = s.strip_prefix("hci").unwrap_or(s);
        if index.chars().all(|c| c.is_ascii_digit()) {
            return index
                .parse()
                .map(DeviceSelector::Hci)
                .map_err(|_| TransportError::InvalidSelector(s.to_string()));
        }

        Ok(DeviceSelector::Serial(s.to_string()))
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Hci(index) => write!(f, "hci{}", index),
            DeviceSelector::Serial(path) => f.write_str(path),
        }
    }
}

/// A raw controller transport
///
/// Methods take `&self` so the transport can be shared with the protocol
/// engine, which writes through it while the host pumps inbound data.
pub trait Transport: Send + Sync {
    /// Opens the device. Failure leaves the transport closed.
    fn init(&self, selector: &DeviceSelector) -> Result<(), TransportError>;

    /// Writes `bytes` to the device as-is. Fails with
    /// `TransportError::Closed` when the device is not open.
    fn write(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Waits up to `timeout` for inbound data (forever when `None`) and
    /// forwards each chunk to `sink` in arrival order. Returns the number of
    /// bytes forwarded; zero means the wait timed out.
    fn poll(&self, sink: &mut dyn ByteSink, timeout: Option<Duration>) -> Result<usize, TransportError>;

    fn is_open(&self) -> bool;

    fn close(&self);
}

/// Picks the adapter able to open `selector`: an unfiltered HCI socket for
/// `hciN`, a serial port otherwise.
pub fn for_selector(selector: &DeviceSelector) -> Arc<dyn Transport> {
    match selector {
        DeviceSelector::Hci(_) => Arc::new(HciSocketTransport::new()),
        DeviceSelector::Serial(_) => Arc::new(SerialTransport::new()),
    }
}
