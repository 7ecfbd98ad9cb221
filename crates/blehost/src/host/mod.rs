//! Host facade
//!
//! `Host` ties a transport, the protocol engine's GAP layer and GATT server
//! profile, the bonding store and the CCC store together. It drives
//! initialization, forwards the GAP procedures, and turns engine callbacks
//! into application events. Each new
//! link is handed to the application as a `ConnectionSession`; events of that
//! link never pass through the host again.


use crate::address::{BdAddr, DeviceAddress};
use crate::bonding::BondingStore;
use crate::ccc::ClientConfigurationStore;
use crate::config::{HostConfig, InitOptions};
use crate::error::{Error, GapError, Result};
use crate::gap::constants::REMOTE_USER_TERMINATED_CONNECTION;
use crate::gap::*;
use crate::observer::Observer;
use crate::session::ConnectionSession;
use crate::transport::{DeviceSelector, Transport};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Uninitialized,
    /// `init` ran; waiting for a usable local address
    Initializing,
    Ready,
}

/// Handle to the host; clones share the same host.
#[derive(Clone)]
pub struct Host {
    shared: Arc<HostShared>,
}

struct HostShared {
    gap: Arc<dyn GapLayer>,
    server: Arc<dyn ServerProfile>,
    transport: Arc<dyn Transport>,
    bonding: Arc<dyn BondingStore>,
    ccc: Arc<ClientConfigurationStore>,
    config: HostConfig,
    state: Mutex<HostState>,
    /// Static address requested from the engine and not yet confirmed
    pending_static: Mutex<Option<BdAddr>>,
    local_address: Mutex<Option<DeviceAddress>>,
    ready: Observer<()>,
    connected: Observer<Arc<ConnectionSession>>,
    discovered: Observer<DiscoveredDevice>,
    privacy_enabled: Observer<DeviceAddress>,
}

impl Host {
    pub fn new(
        gap: Arc<dyn GapLayer>,
        server: Arc<dyn ServerProfile>,
        transport: Arc<dyn Transport>,
        bonding: Arc<dyn BondingStore>,
        config: HostConfig,
    ) -> Self {
        Self {
            shared: Arc::new(HostShared {
                gap,
                server,
                transport,
                bonding,
                ccc: Arc::new(ClientConfigurationStore::new()),
                config,
                state: Mutex::new(HostState::Uninitialized),
                pending_static: Mutex::new(None),
                local_address: Mutex::new(None),
                ready: Observer::new(),
                connected: Observer::new(),
                discovered: Observer::new(),
                privacy_enabled: Observer::new(),
            }),
        }
    }

    /// Configures logging, opens the transport and starts the GAP layer in
    /// controller mode. A transport that fails to open leaves the host
    /// unusable; the error is returned here.
    pub fn init(&self, selector: &DeviceSelector, options: &InitOptions) -> Result<()> {
        let shared = &self.shared;
        if let Some(address) = shared.config.static_address {
            let address = DeviceAddress::random(address);
            if !address.is_valid() {
                return Err(Error::InvalidAddress(address));
            }
        }

        {
            let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != HostState::Uninitialized {
                return Err(Error::AlreadyInitialized);
            }
            *state = HostState::Initializing;
        }

        options.apply();
        info!("Initializing host on {}", selector);

        if shared.config.clear_bondings {
            debug!("Clearing bonding records");
            shared.bonding.clear();
            shared.ccc.clear();
        }

        shared.transport.init(selector).map_err(|e| {
            error!("Failed to open {}: {}", selector, e);
            e
        })?;

        let delegate: Arc<dyn GapDelegate> = shared.clone();
        let delegate: Weak<dyn GapDelegate> = Arc::downgrade(&delegate);
        shared.gap.init(shared.transport.clone(), delegate, true)?;
        Ok(())
    }

    /// Moves inbound transport data into the GAP layer, waiting up to
    /// `timeout` for it. Engine callbacks run on this thread before it
    /// returns.
    pub fn process_events(&self, timeout: Option<Duration>) -> Result<usize> {
        if self.state() == HostState::Uninitialized {
            return Err(Error::NotInitialized);
        }
        let gap = self.shared.gap.clone();
        let mut sink = |data: &[u8], offset: usize, len: usize| gap.receive(data, offset, len);
        Ok(self.shared.transport.poll(&mut sink, timeout)?)
    }

    pub fn state(&self) -> HostState {
        self.shared.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == HostState::Ready
    }

    /// Address the host is known by once ready
    pub fn local_address(&self) -> Option<DeviceAddress> {
        *self
            .shared
            .local_address
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &HostConfig {
        &self.shared.config
    }

    /// GATT server profile whose database every link's bearer serves
    pub fn server(&self) -> &Arc<dyn ServerProfile> {
        &self.shared.server
    }

    pub fn client_configurations(&self) -> &Arc<ClientConfigurationStore> {
        &self.shared.ccc
    }

    pub fn bonding_store(&self) -> &Arc<dyn BondingStore> {
        &self.shared.bonding
    }

    // Observer registration; each replaces the previous observer

    pub fn on_ready<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.ready.set(move |()| callback());
    }

    pub fn on_connected<F>(&self, callback: F)
    where
        F: Fn(Arc<ConnectionSession>) + Send + Sync + 'static,
    {
        self.shared.connected.set(callback);
    }

    pub fn on_discovered<F>(&self, callback: F)
    where
        F: Fn(DiscoveredDevice) + Send + Sync + 'static,
    {
        self.shared.discovered.set(callback);
    }

    pub fn on_privacy_enabled<F>(&self, callback: F)
    where
        F: Fn(DeviceAddress) + Send + Sync + 'static,
    {
        self.shared.privacy_enabled.set(callback);
    }

    // GAP procedures

    pub fn start_scanning(&self, parameters: &ScanParameters) -> Result<()> {
        debug!("Start scanning: {:?}", parameters);
        self.shared.gap.start_scanning(parameters)?;
        Ok(())
    }

    pub fn stop_scanning(&self) -> Result<()> {
        self.shared.gap.stop_scanning()?;
        Ok(())
    }

    /// Connects to `address`, or to the first white-listed device when
    /// `None`. The link is reported through `on_connected`.
    pub fn connect(
        &self,
        address: Option<DeviceAddress>,
        parameters: Option<ConnectionParameterRequest>,
    ) -> Result<()> {
        match address {
            Some(address) => debug!("Connecting to {}", address),
            None => debug!("Connecting to white list"),
        }
        self.shared.gap.establish_connection(address, parameters)?;
        Ok(())
    }

    /// Starts advertising; the payloads are encoded to wire form first.
    pub fn start_advertising(&self, parameters: &AdvertisingParameters) -> Result<()> {
        let encoded = parameters.encode()?;
        self.shared.gap.start_advertising(&encoded)?;
        Ok(())
    }

    pub fn stop_advertising(&self) -> Result<()> {
        self.shared.gap.stop_advertising()?;
        Ok(())
    }

    pub fn enable_privacy(&self) -> Result<()> {
        self.shared.gap.enable_privacy_feature(true)?;
        Ok(())
    }

    pub fn disable_privacy(&self) -> Result<()> {
        self.shared.gap.enable_privacy_feature(false)?;
        Ok(())
    }

    pub fn set_white_list(&self, addresses: &[DeviceAddress]) -> Result<()> {
        self.shared.gap.set_white_list(addresses)?;
        Ok(())
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("state", &self.state())
            .field("local_address", &self.local_address())
            .finish()
    }
}

impl HostShared {
    fn state(&self) -> HostState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter_ready(&self, address: DeviceAddress) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == HostState::Ready {
                return;
            }
            *state = HostState::Ready;
        }
        *self.local_address.lock().unwrap_or_else(PoisonError::into_inner) = Some(address);
        info!("Host ready, address {}", address);
        self.ready.emit(());
    }

    fn request_static_address(&self) {
        let address = self
            .config
            .static_address
            .map(DeviceAddress::random)
            .unwrap_or_else(DeviceAddress::random_static);
        debug!("No public address, requesting static address {}", address);

        *self.pending_static.lock().unwrap_or_else(PoisonError::into_inner) = Some(address.addr);
        if let Err(e) = self.gap.set_static_address(address.addr) {
            warn!("Static address request failed: {}", e);
            self.pending_static
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
    }
}

impl GapDelegate for HostShared {
    fn gap_ready(&self) {
        if self.state() != HostState::Initializing {
            debug!("GAP ready reported in state {:?}, ignored", self.state());
            return;
        }

        match self.gap.public_address().map(DeviceAddress::public) {
            Some(address) if address.is_valid() => self.enter_ready(address),
            _ => self.request_static_address(),
        }
    }

    fn gap_connected(&self, connection: Arc<dyn LinkConnection>) {
        let session = ConnectionSession::open(
            connection.clone(),
            self.server.clone(),
            self.ccc.clone(),
            self.bonding.clone(),
        );
        match session {
            Ok(session) => {
                info!(
                    "Connected to {} (handle 0x{:04X})",
                    session.address(),
                    session.handle()
                );
                self.connected.emit(session);
            }
            Err(e) => {
                error!(
                    "Failed to set up session for 0x{:04X}: {}",
                    connection.handle(),
                    e
                );
                if let Err(e) = connection.disconnect(REMOTE_USER_TERMINATED_CONNECTION) {
                    warn!("Failed to drop link 0x{:04X}: {}", connection.handle(), e);
                }
            }
        }
    }

    fn gap_discovered(&self, mut device: DiscoveredDevice) {
        device.parse_payload();
        self.discovered.emit(device);
    }

    fn privacy_enabled(&self, private_address: DeviceAddress) {
        debug!("Privacy enabled, advertising as {}", private_address);
        self.privacy_enabled.emit(private_address);
    }

    fn static_address_assigned(&self, result: std::result::Result<BdAddr, GapError>) {
        let pending = self
            .pending_static
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(pending) = pending else {
            warn!("Unexpected static address completion: {:?}", result);
            return;
        };

        match result {
            Ok(assigned) => {
                let address = DeviceAddress::random(assigned);
                if assigned != pending || !address.is_valid() {
                    warn!("Controller assigned {} instead of {}", address, pending);
                    return;
                }
                self.enter_ready(address);
            }
            Err(e) => warn!("Static address {} rejected: {}", pending, e),
        }
    }
}
