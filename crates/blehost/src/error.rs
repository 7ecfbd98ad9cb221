//! Error types for the blehost library
//!
//! This module defines the error types used throughout the library.

use crate::address::DeviceAddress;
use crate::advertising::AdvertisingError;
use thiserror::Error;

/// Errors raised by a transport adapter
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open HCI socket: {0}")]
    Open(std::io::Error),

    #[error("Failed to bind to HCI device: {0}")]
    Bind(std::io::Error),

    #[error("Failed to install HCI socket filter: {0}")]
    Filter(std::io::Error),

    #[error("Failed to write to device: {0}")]
    Write(std::io::Error),

    #[error("Failed to read from device: {0}")]
    Read(std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Device selector {0} is not supported by this transport")]
    UnsupportedSelector(String),

    #[error("Invalid device selector: {0}")]
    InvalidSelector(String),

    #[error("Transport is closed")]
    Closed,
}

/// Errors reported by the GAP/GATT protocol engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GapError {
    #[error("Request rejected by the protocol engine: {0}")]
    Rejected(String),

    #[error("Protocol engine is busy")]
    Busy,

    #[error("Unsupported operation")]
    Unsupported,
}

/// Errors returned by the host and its connection sessions
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Gap(#[from] GapError),

    #[error(transparent)]
    Advertising(#[from] AdvertisingError),

    #[error("Connection session is closed")]
    SessionClosed,

    #[error("Invalid device address: {0}")]
    InvalidAddress(DeviceAddress),

    #[error("Host is already initialized")]
    AlreadyInitialized,

    #[error("Host is not initialized")]
    NotInitialized,

    #[error("Invalid logging configuration: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
