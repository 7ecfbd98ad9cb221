//! blehost - Session and state layer of a Bluetooth Low Energy host
//!
//! This library sits between an application and a GAP/GATT protocol engine.
//! It opens the controller over an HCI socket or a serial line, drives the
//! engine's initialization, wraps every established link in a
//! `ConnectionSession`, and keeps Client Characteristic Configuration values
//! per peer identity so bonded devices find their subscriptions again.
//!
//! The protocol engine itself is reached through the traits in `gap::engine`.

pub mod address;
pub mod advertising;
pub mod bearer;
pub mod bonding;
pub mod ccc;
pub mod config;
pub mod error;
pub mod gap;
pub mod host;
pub mod observer;
pub mod session;
pub mod transport;
pub mod uuid;

#[cfg(test)]
mod testing;

// Re-export common types for convenience
pub use address::{AddressType, BdAddr, DeviceAddress, IdentityKey};
pub use advertising::{AdFlags, AdPayload, AdStructure, AdvertisingData};
pub use bonding::{Bond, BondingStore, MemoryBondingStore};
pub use ccc::{ClientConfiguration, ClientConfigurationStore};
pub use config::{HostConfig, InitOptions, LoggerConfig};
pub use error::{Error, GapError, Result, TransportError};
pub use gap::{
    AdvertisingParameters, CharacteristicProperties, ConnectionParameterRequest,
    ConnectionParameters, DiscoveredDevice, GapLayer, ScanParameters, SecurityParameters,
    ServerProfile,
};
pub use host::{Host, HostState};
pub use session::{ConnectionSession, SessionState};
pub use transport::{DeviceSelector, HciFilter, HciSocketTransport, SerialTransport, Transport};
pub use uuid::Uuid;
