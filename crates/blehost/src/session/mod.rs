//! Connection sessions
//!
//! A `ConnectionSession` wraps one established link. It owns the link's ATT
//! bearer adapter and GATT client, forwards link controls to the engine, and
//! surfaces the link's events to application observers until the link goes
//! down.


use crate::bearer::{link_identity, AttBearer};
use crate::bonding::{Bond, BondingStore};
use crate::ccc::ClientConfigurationStore;
use crate::error::{Error, Result};
use crate::gap::*;
use crate::address::DeviceAddress;
use crate::observer::Observer;
use log::{debug, trace};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Terminal; reached when the link's disconnect event arrives
    Closed,
}

pub struct ConnectionSession {
    connection: Arc<dyn LinkConnection>,
    store: Arc<ClientConfigurationStore>,
    bonding: Arc<dyn BondingStore>,
    bearer: Arc<AttBearer>,
    client: Mutex<Option<Arc<dyn ClientProfile>>>,
    state: Mutex<SessionState>,
    passkey_requested: Observer<bool>,
    authentication_completed: Observer<bool>,
    authentication_failed: Observer<AuthenticationFailure>,
    disconnected: Observer<u8>,
    updated: Observer<ConnectionParameters>,
}

impl ConnectionSession {
    /// Builds the session for a new link and binds it as the link's event
    /// delegate. The bearer and client exist before the binding, and the
    /// binding exists before this returns.
    pub fn open(
        connection: Arc<dyn LinkConnection>,
        server: Arc<dyn ServerProfile>,
        store: Arc<ClientConfigurationStore>,
        bonding: Arc<dyn BondingStore>,
    ) -> Result<Arc<Self>> {
        let bearer = Arc::new(AttBearer::new(store.clone()));
        let client: Arc<dyn ClientProfile> =
            Arc::from(connection.open_client(server, bearer.clone())?);

        let session = Arc::new(Self {
            connection,
            store,
            bonding,
            bearer,
            client: Mutex::new(Some(client)),
            state: Mutex::new(SessionState::Active),
            passkey_requested: Observer::new(),
            authentication_completed: Observer::new(),
            authentication_failed: Observer::new(),
            disconnected: Observer::new(),
            updated: Observer::new(),
        });

        let delegate: Arc<dyn ConnectionDelegate> = session.clone();
        session.connection.bind_delegate(Some(delegate));
        debug!(
            "session 0x{:04X} opened for {}",
            session.connection.handle(),
            session.connection.address()
        );
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    fn active_link(&self) -> Result<&dyn LinkConnection> {
        match self.state() {
            SessionState::Active => Ok(self.connection.as_ref()),
            SessionState::Closed => Err(Error::SessionClosed),
        }
    }

    // Observer registration; each replaces the previous observer

    pub fn on_passkey_requested<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.passkey_requested.set(callback);
    }

    pub fn on_authentication_completed<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.authentication_completed.set(callback);
    }

    pub fn on_authentication_failed<F>(&self, callback: F)
    where
        F: Fn(AuthenticationFailure) + Send + Sync + 'static,
    {
        self.authentication_failed.set(callback);
    }

    pub fn on_disconnected<F>(&self, callback: F)
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.disconnected.set(callback);
    }

    pub fn on_updated<F>(&self, callback: F)
    where
        F: Fn(ConnectionParameters) + Send + Sync + 'static,
    {
        self.updated.set(callback);
    }

    // Link state

    pub fn handle(&self) -> u16 {
        self.connection.handle()
    }

    pub fn address(&self) -> DeviceAddress {
        self.connection.address()
    }

    pub fn identity(&self) -> Option<DeviceAddress> {
        self.connection.identity()
    }

    pub fn is_peripheral(&self) -> bool {
        self.connection.is_peripheral()
    }

    pub fn parameters(&self) -> ConnectionParameters {
        self.connection.parameters()
    }

    pub fn is_encrypted(&self) -> bool {
        self.connection.is_encrypted()
    }

    pub fn security_info(&self) -> Option<SecurityInfo> {
        self.connection.security_info()
    }

    /// The GATT client of this link, released once the session closes
    pub fn client(&self) -> Result<Arc<dyn ClientProfile>> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::SessionClosed)
    }

    pub fn bearer(&self) -> &Arc<AttBearer> {
        &self.bearer
    }

    /// Bonding record of the peer, if it is bonded
    pub fn bond(&self) -> Option<Bond> {
        self.bonding.load(&link_identity(self.connection.as_ref()))
    }

    // Link controls

    pub fn disconnect(&self, reason: u8) -> Result<()> {
        self.active_link()?.disconnect(reason)?;
        Ok(())
    }

    /// `l2cap` selects the L2CAP connection parameter update procedure
    /// instead of the link-layer one.
    pub fn update_connection(&self, parameters: &ConnectionParameterRequest, l2cap: bool) -> Result<()> {
        self.active_link()?
            .update_connection_parameters(parameters, l2cap)?;
        Ok(())
    }

    pub fn start_authentication(&self) -> Result<()> {
        self.active_link()?.start_authentication()?;
        Ok(())
    }

    pub fn set_security_parameters(&self, parameters: &SecurityParameters) -> Result<()> {
        self.active_link()?.set_security_parameters(parameters)?;
        Ok(())
    }

    pub fn passkey_entry(&self, passkey: u32) -> Result<()> {
        self.active_link()?.passkey_entry(passkey)?;
        Ok(())
    }

    fn ignore_if_closed(&self, event: &str) -> bool {
        let closed = self.is_closed();
        if closed {
            trace!("session 0x{:04X} closed, dropping {}", self.handle(), event);
        }
        closed
    }

    fn detach_observers(&self) {
        self.passkey_requested.clear();
        self.authentication_completed.clear();
        self.authentication_failed.clear();
        self.disconnected.clear();
        self.updated.clear();
    }
}

impl ConnectionDelegate for ConnectionSession {
    fn passkey_requested(&self, input: bool) {
        if !self.ignore_if_closed("passkey request") {
            self.passkey_requested.emit(input);
        }
    }

    fn encryption_completed(&self, security_changed: bool) {
        if !self.ignore_if_closed("encryption completion") {
            self.authentication_completed.emit(security_changed);
        }
    }

    fn pairing_failed(&self, reason: u8) {
        if !self.ignore_if_closed("pairing failure") {
            self.authentication_failed.emit(AuthenticationFailure {
                reason,
                phase: AuthenticationPhase::Pairing,
            });
        }
    }

    fn encryption_failed(&self, reason: u8) {
        if !self.ignore_if_closed("encryption failure") {
            self.authentication_failed.emit(AuthenticationFailure {
                reason,
                phase: AuthenticationPhase::Encryption,
            });
        }
    }

    fn disconnected(&self, reason: u8) {
        // Bonding and identity as they stand right now decide the CCC purge
        let identity = link_identity(self.connection.as_ref());
        let was_bonded = self
            .connection
            .security_info()
            .map_or(false, |info| info.bonding);

        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == SessionState::Closed {
                trace!("session 0x{:04X} already closed", self.connection.handle());
                return;
            }
            *state = SessionState::Closed;
        }
        debug!(
            "session 0x{:04X} closed, reason 0x{:02X}",
            self.connection.handle(),
            reason
        );

        // Only the key of a bonded identity address survives; keys used
        // before the peer resolved are dropped with the rest.
        let identity_key = identity.identity_key();
        let mut keys = self.bearer.keys();
        if !keys.contains(&identity_key) {
            keys.push(identity_key.clone());
        }
        for key in &keys {
            let is_identity_address = *key == identity_key && identity.is_identity();
            self.store.on_disconnect(key, was_bonded, is_identity_address);
        }

        let client = self.client.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(client) = client {
            client.close();
        }
        self.connection.bind_delegate(None);

        self.disconnected.emit(reason);
        self.detach_observers();
    }

    fn connection_updated(&self, parameters: ConnectionParameters) {
        if !self.ignore_if_closed("parameter update") {
            self.updated.emit(parameters);
        }
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("handle", &self.connection.handle())
            .field("address", &self.connection.address())
            .field("state", &self.state())
            .finish()
    }
}
