use crate::address::DeviceAddress;
use crate::advertising::{AdPayload, AdvertisingData, AdvertisingError};
use crate::gap::constants::*;
use bitflags::bitflags;

/// Scanning parameters. The default performs general discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanParameters {
    /// Observer procedure instead of general discovery
    pub observer: bool,
    pub active: bool,
    pub duplicates_filter: bool,
    pub interval: u16,
    pub window: u16,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            observer: false,
            active: true,
            duplicates_filter: true,
            interval: LE_SCAN_INTERVAL,
            window: LE_SCAN_WINDOW,
        }
    }
}

/// Advertising parameters. The default is general discoverable and
/// undirected connectable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingParameters {
    pub discoverable: bool,
    pub connectable: bool,
    pub interval_min: u16,
    pub interval_max: u16,
    pub advertising: Option<AdvertisingData>,
    pub scan_response: Option<AdvertisingData>,
}

impl Default for AdvertisingParameters {
    fn default() -> Self {
        Self {
            discoverable: true,
            connectable: true,
            interval_min: LE_ADV_INTERVAL_MIN,
            interval_max: LE_ADV_INTERVAL_MAX,
            advertising: None,
            scan_response: None,
        }
    }
}

impl AdvertisingParameters {
    /// Serializes both payloads into wire form.
    pub fn encode(&self) -> Result<EncodedAdvertising, AdvertisingError> {
        Ok(EncodedAdvertising {
            discoverable: self.discoverable,
            connectable: self.connectable,
            interval_min: self.interval_min,
            interval_max: self.interval_max,
            advertising: self.advertising.as_ref().map(AdvertisingData::to_bytes).transpose()?,
            scan_response: self.scan_response.as_ref().map(AdvertisingData::to_bytes).transpose()?,
        })
    }
}

/// `AdvertisingParameters` with payloads already in wire encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAdvertising {
    pub discoverable: bool,
    pub connectable: bool,
    pub interval_min: u16,
    pub interval_max: u16,
    pub advertising: Option<Vec<u8>>,
    pub scan_response: Option<Vec<u8>>,
}

/// Parameters of an established connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameters {
    /// Connection interval, in 1.25 ms units
    pub interval: u16,
    pub latency: u16,
    /// Supervision timeout, in 10 ms units
    pub supervision_timeout: u16,
}

/// Requested connection parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameterRequest {
    pub interval_min: u16,
    pub interval_max: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

impl Default for ConnectionParameterRequest {
    fn default() -> Self {
        Self {
            interval_min: LE_CONN_INTERVAL_MIN,
            interval_max: LE_CONN_INTERVAL_MAX,
            latency: LE_CONN_LATENCY,
            supervision_timeout: LE_SUPERVISION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
}

/// Local security requirements for pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityParameters {
    pub bonding: bool,
    pub mitm: bool,
    pub secure_connections: bool,
    pub keypress: bool,
    pub io_capability: IoCapability,
}

impl Default for SecurityParameters {
    fn default() -> Self {
        Self {
            bonding: true,
            mitm: false,
            secure_connections: true,
            keypress: false,
            io_capability: IoCapability::NoInputNoOutput,
        }
    }
}

/// Security state of a link as reported by the protocol engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityInfo {
    /// Keys from this pairing were bonded
    pub bonding: bool,
    pub authenticated: bool,
    pub key_size: u8,
}

/// Which phase of authentication failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationPhase {
    Pairing,
    Encryption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationFailure {
    pub reason: u8,
    pub phase: AuthenticationPhase,
}

impl AuthenticationFailure {
    pub fn is_pairing_failure(&self) -> bool {
        self.phase == AuthenticationPhase::Pairing
    }
}

bitflags! {
    /// Characteristic properties as declared in the attribute database
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicProperties: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

impl CharacteristicProperties {
    /// Whether a client subscribes to this characteristic through a CCC
    /// descriptor
    pub fn has_client_configuration(&self) -> bool {
        self.intersects(Self::NOTIFY | Self::INDICATE)
    }
}

/// A device seen while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: DeviceAddress,
    pub rssi: i8,
    pub connectable: bool,
    pub scannable: bool,
    /// Directed advertisements carry no payload worth parsing
    pub directed: bool,
    pub advertising: AdPayload,
    pub scan_response: Option<AdPayload>,
}

impl DiscoveredDevice {
    /// Parses the payload an application cares about: the scan response when
    /// present, otherwise the advertising data of undirected advertisements.
    pub fn parse_payload(&mut self) {
        if let Some(scan_response) = self.scan_response.as_mut() {
            scan_response.parse_in_place();
        } else if !self.directed {
            self.advertising.parse_in_place();
        }
    }
}
