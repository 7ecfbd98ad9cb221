//! Interface to the GAP/GATT protocol engine
//!
//! The engine decodes HCI traffic, runs the GAP procedures and the security
//! manager, and owns the ATT/GATT state machines. This crate only drives it
//! through the traits below and receives its callbacks.

use crate::address::{BdAddr, DeviceAddress};
use crate::error::GapError;
use crate::gap::types::*;
use crate::transport::Transport;
use crate::uuid::Uuid;
use std::sync::{Arc, Weak};

/// The GAP layer of the protocol engine
pub trait GapLayer: Send + Sync {
    /// Starts the stack on top of `transport`. `controller_mode` enables both
    /// central and peripheral roles.
    fn init(
        &self,
        transport: Arc<dyn Transport>,
        delegate: Weak<dyn GapDelegate>,
        controller_mode: bool,
    ) -> Result<(), GapError>;

    /// Feeds inbound transport bytes to the HCI decoder.
    fn receive(&self, data: &[u8], offset: usize, len: usize);

    /// Factory-programmed public address, once read from the controller
    fn public_address(&self) -> Option<BdAddr>;

    /// Requests a static random address. Completion is reported through
    /// `GapDelegate::static_address_assigned`.
    fn set_static_address(&self, address: BdAddr) -> Result<(), GapError>;

    fn start_scanning(&self, parameters: &ScanParameters) -> Result<(), GapError>;

    fn stop_scanning(&self) -> Result<(), GapError>;

    /// Connects to `address`, or to any white-listed device when `None`.
    fn establish_connection(
        &self,
        address: Option<DeviceAddress>,
        parameters: Option<ConnectionParameterRequest>,
    ) -> Result<(), GapError>;

    fn start_advertising(&self, parameters: &EncodedAdvertising) -> Result<(), GapError>;

    fn stop_advertising(&self) -> Result<(), GapError>;

    fn enable_privacy_feature(&self, enabled: bool) -> Result<(), GapError>;

    fn set_white_list(&self, addresses: &[DeviceAddress]) -> Result<(), GapError>;
}

/// Host-level callbacks invoked by the GAP layer
pub trait GapDelegate: Send + Sync {
    fn gap_ready(&self);

    fn gap_connected(&self, connection: Arc<dyn LinkConnection>);

    fn gap_discovered(&self, device: DiscoveredDevice);

    fn privacy_enabled(&self, private_address: DeviceAddress);

    fn static_address_assigned(&self, result: Result<BdAddr, GapError>);
}

/// One established link, as owned by the GAP layer
pub trait LinkConnection: Send + Sync {
    fn handle(&self) -> u16;

    /// Current peer address, possibly a rotating private one
    fn address(&self) -> DeviceAddress;

    /// Identity address the peer resolved to, if resolution happened
    fn identity(&self) -> Option<DeviceAddress>;

    fn is_peripheral(&self) -> bool;

    fn parameters(&self) -> ConnectionParameters;

    fn is_encrypted(&self) -> bool;

    fn security_info(&self) -> Option<SecurityInfo>;

    /// Routes every later event of this link to `delegate`, replacing any
    /// delegate bound before. `None` unbinds.
    fn bind_delegate(&self, delegate: Option<Arc<dyn ConnectionDelegate>>);

    /// Creates the ATT bearer for this link over the attribute database of
    /// `server`, and the GATT client on top of it. CCC descriptor storage is
    /// delegated to `hooks`.
    fn open_client(
        &self,
        server: Arc<dyn ServerProfile>,
        hooks: Arc<dyn ClientConfigurationHooks>,
    ) -> Result<Box<dyn ClientProfile>, GapError>;

    fn disconnect(&self, reason: u8) -> Result<(), GapError>;

    fn update_connection_parameters(
        &self,
        parameters: &ConnectionParameterRequest,
        l2cap: bool,
    ) -> Result<(), GapError>;

    fn start_authentication(&self) -> Result<(), GapError>;

    fn set_security_parameters(&self, parameters: &SecurityParameters) -> Result<(), GapError>;

    fn passkey_entry(&self, passkey: u32) -> Result<(), GapError>;
}

/// Per-link callbacks invoked by the GAP layer
pub trait ConnectionDelegate: Send + Sync {
    /// `input` is true when the local side must type the passkey.
    fn passkey_requested(&self, input: bool);

    fn encryption_completed(&self, security_changed: bool);

    fn pairing_failed(&self, reason: u8);

    fn encryption_failed(&self, reason: u8);

    fn disconnected(&self, reason: u8);

    fn connection_updated(&self, parameters: ConnectionParameters);
}

/// CCC storage hooks consulted by the ATT bearer
pub trait ClientConfigurationHooks: Send + Sync {
    fn read_client_configuration(&self, characteristic: &Uuid, connection: &dyn LinkConnection) -> u16;

    fn write_client_configuration(
        &self,
        characteristic: &Uuid,
        connection: &dyn LinkConnection,
        value: u16,
    );
}

/// The engine's GATT server profile
///
/// Owns the local attribute database every bearer of the host serves.
pub trait ServerProfile: Send + Sync {
    /// Adds a service declaration and returns its handle.
    fn add_service(&self, uuid: Uuid, is_primary: bool) -> Result<u16, GapError>;

    /// Adds a characteristic to the service declared at `service_handle`
    /// and returns the value handle. Notifying or indicating
    /// characteristics get a CCC descriptor.
    fn add_characteristic(
        &self,
        service_handle: u16,
        uuid: Uuid,
        properties: CharacteristicProperties,
        initial_value: Vec<u8>,
    ) -> Result<u16, GapError>;

    fn set_value(&self, value_handle: u16, value: &[u8]) -> Result<(), GapError>;
}

/// The engine's GATT client profile bound to one bearer
pub trait ClientProfile: Send + Sync {
    /// Releases the bearer; called once when the link goes down.
    fn close(&self);
}
