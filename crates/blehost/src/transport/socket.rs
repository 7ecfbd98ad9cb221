//! HCI socket transport
//!
//! Talks to a local controller through a Linux `AF_BLUETOOTH` HCI socket.
//! Without a filter the socket is bound to the user channel, which hands the
//! host exclusive, unfiltered access to the controller.

use super::constants::*;
use super::filter::HciFilter;
use super::{ByteSink, DeviceSelector, Transport};
use crate::error::TransportError;
use log::{debug, trace};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

const CLOSED: RawFd = -1;

// Define the sockaddr_hci structure
#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

#[derive(Debug)]
pub struct HciSocketTransport {
    fd: AtomicI32,
    filter: Option<HciFilter>,
}

impl HciSocketTransport {
    pub fn new() -> Self {
        Self {
            fd: AtomicI32::new(CLOSED),
            filter: None,
        }
    }

    /// Installs `filter` on the socket when it is opened. The kernel only
    /// honours filters on the raw channel, so a filtered transport binds
    /// there instead of the user channel.
    pub fn with_filter(filter: HciFilter) -> Self {
        Self {
            fd: AtomicI32::new(CLOSED),
            filter: Some(filter),
        }
    }

    pub fn filter(&self) -> Option<&HciFilter> {
        self.filter.as_ref()
    }

    fn channel(&self) -> u16 {
        if self.filter.is_some() {
            HCI_CHANNEL_RAW
        } else {
            HCI_CHANNEL_USER
        }
    }

    fn open_fd(&self) -> Result<RawFd, TransportError> {
        match self.fd.load(Ordering::Acquire) {
            CLOSED => Err(TransportError::Closed),
            fd => Ok(fd),
        }
    }

    fn set_socket_filter(fd: RawFd, filter: &HciFilter) -> Result<(), TransportError> {
        let bytes = filter.to_bytes();
        debug!("setting filter to: {}", hex::encode(bytes));

        let result = unsafe {
            libc::setsockopt(
                fd,
                SOL_HCI,
                HCI_FILTER,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(TransportError::Filter(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Waits until the socket is readable. Returns false on timeout.
    fn wait_readable(fd: RawFd, timeout: Option<Duration>) -> Result<bool, TransportError> {
        let Some(timeout) = timeout else {
            return Ok(true);
        };

        let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe {
            libc::FD_ZERO(&mut read_fds);
            libc::FD_SET(fd, &mut read_fds);
        }

        let mut timeout_val = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };

        let result = unsafe {
            libc::select(
                fd + 1,
                &mut read_fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut timeout_val,
            )
        };

        if result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(TransportError::Read(err));
        }
        Ok(result > 0)
    }
}

impl Default for HciSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HciSocketTransport {
    fn init(&self, selector: &DeviceSelector) -> Result<(), TransportError> {
        let DeviceSelector::Hci(dev_id) = selector else {
            return Err(TransportError::UnsupportedSelector(selector.to_string()));
        };

        let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW | libc::SOCK_CLOEXEC, BTPROTO_HCI) };
        if fd < 0 {
            return Err(TransportError::Open(std::io::Error::last_os_error()));
        }

        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: *dev_id,
            hci_channel: self.channel(),
        };

        let result = unsafe {
            libc::bind(
                fd,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(TransportError::Bind(err));
        }

        if let Some(filter) = &self.filter {
            if let Err(e) = Self::set_socket_filter(fd, filter) {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        }

        let previous = self.fd.swap(fd, Ordering::AcqRel);
        if previous != CLOSED {
            unsafe { libc::close(previous) };
        }
        debug!("opened hci{} on fd {}", dev_id, fd);
        Ok(())
    }

    fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let fd = self.open_fd()?;
        trace!("> {}", hex::encode(bytes));

        let written = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        if written < 0 {
            return Err(TransportError::Write(std::io::Error::last_os_error()));
        }
        if written as usize != bytes.len() {
            return Err(TransportError::Write(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "short write to HCI socket",
            )));
        }
        Ok(())
    }

    fn poll(&self, sink: &mut dyn ByteSink, timeout: Option<Duration>) -> Result<usize, TransportError> {
        let fd = self.open_fd()?;
        if !Self::wait_readable(fd, timeout)? {
            return Ok(0);
        }

        let mut buffer = [0u8; HCI_MAX_FRAME_SIZE];
        let bytes_read = unsafe {
            libc::read(fd, buffer.as_mut_ptr() as *mut libc::c_void, buffer.len())
        };

        if bytes_read < 0 {
            return Err(TransportError::Read(std::io::Error::last_os_error()));
        }

        let len = bytes_read as usize;
        if len > 0 {
            trace!("< {}", hex::encode(&buffer[..len]));
            sink.receive(&buffer[..len], 0, len);
        }
        Ok(len)
    }

    fn is_open(&self) -> bool {
        self.fd.load(Ordering::Acquire) != CLOSED
    }

    fn close(&self) {
        let fd = self.fd.swap(CLOSED, Ordering::AcqRel);
        if fd != CLOSED {
            unsafe { libc::close(fd) };
            debug!("closed HCI socket fd {}", fd);
        }
    }
}

impl Drop for HciSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}
