//! ATT bearer storage adapter
//!
//! Redirects the bearer's CCC read/write hooks to the host-wide
//! `ClientConfigurationStore`, so subscriptions outlive a single bearer.

use crate::address::{DeviceAddress, IdentityKey};
use crate::ccc::ClientConfigurationStore;
use crate::gap::{ClientConfigurationHooks, LinkConnection};
use crate::uuid::Uuid;
use log::trace;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Address the CCC cache is keyed by: the resolved identity when the peer has
/// one, else whatever address it is currently using.
pub fn link_identity(connection: &dyn LinkConnection) -> DeviceAddress {
    connection.identity().unwrap_or_else(|| connection.address())
}

pub fn link_identity_key(connection: &dyn LinkConnection) -> IdentityKey {
    link_identity(connection).identity_key()
}

#[derive(Debug)]
pub struct AttBearer {
    store: Arc<ClientConfigurationStore>,
    /// Every key this bearer touched; a peer resolving its identity
    /// mid-link leaves entries under its earlier address.
    keys: Mutex<BTreeSet<IdentityKey>>,
}

impl AttBearer {
    pub fn new(store: Arc<ClientConfigurationStore>) -> Self {
        Self {
            store,
            keys: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<ClientConfigurationStore> {
        &self.store
    }

    /// Keys read or written through this bearer so far
    pub fn keys(&self) -> Vec<IdentityKey> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn key_for(&self, connection: &dyn LinkConnection) -> IdentityKey {
        let key = link_identity_key(connection);
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        key
    }
}

impl ClientConfigurationHooks for AttBearer {
    fn read_client_configuration(&self, characteristic: &Uuid, connection: &dyn LinkConnection) -> u16 {
        let value = self.store.read(characteristic, &self.key_for(connection));
        trace!("CCC read {:?} on 0x{:04X}: 0x{:04X}", characteristic, connection.handle(), value);
        value
    }

    fn write_client_configuration(
        &self,
        characteristic: &Uuid,
        connection: &dyn LinkConnection,
        value: u16,
    ) {
        trace!("CCC write {:?} on 0x{:04X}: 0x{:04X}", characteristic, connection.handle(), value);
        self.store
            .write(characteristic, &self.key_for(connection), value);
    }
}
