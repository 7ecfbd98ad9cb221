//! Client Characteristic Configuration storage
//!
//! Keeps the notification/indication subscription state each peer wrote to
//! our CCC descriptors, keyed by peer identity and characteristic UUID.

use crate::address::IdentityKey;
use crate::uuid::Uuid;
use bitflags::bitflags;
use log::debug;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Value read for a characteristic no peer has subscribed to
pub const CCC_DEFAULT: u16 = 0x0000;

bitflags! {
    /// Bits of a CCC descriptor value
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClientConfiguration: u16 {
        const NOTIFICATION = 0x0001;
        const INDICATION = 0x0002;
    }
}

/// In-memory CCC cache shared by every bearer of a host
#[derive(Debug, Default)]
pub struct ClientConfigurationStore {
    configs: RwLock<HashMap<IdentityKey, HashMap<Uuid, u16>>>,
}

impl ClientConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored value, or `CCC_DEFAULT` when nothing was written.
    pub fn read(&self, characteristic: &Uuid, identity: &IdentityKey) -> u16 {
        let mut configs = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        configs
            .entry(identity.clone())
            .or_default()
            .get(characteristic)
            .copied()
            .unwrap_or(CCC_DEFAULT)
    }

    pub fn write(&self, characteristic: &Uuid, identity: &IdentityKey, value: u16) {
        let mut configs = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        configs
            .entry(identity.clone())
            .or_default()
            .insert(*characteristic, value);
    }

    /// Drops the peer's entries unless it was bonded under an identity
    /// address. Returns whether the entries were kept.
    pub fn on_disconnect(&self, identity: &IdentityKey, was_bonded: bool, is_identity_address: bool) -> bool {
        if was_bonded && is_identity_address {
            debug!("CCC for {} will be kept", identity);
            return true;
        }

        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
        debug!("CCC for {} has been deleted", identity);
        false
    }

    /// Whether an entry set exists for `identity`.
    pub fn contains(&self, identity: &IdentityKey) -> bool {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identity)
    }

    /// Number of identities with an entry set
    pub fn len(&self) -> usize {
        self.configs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.configs.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{BdAddr, DeviceAddress};

    fn peer(s: &str) -> IdentityKey {
        DeviceAddress::public(s.parse::<BdAddr>().unwrap()).identity_key()
    }

    #[test]
    fn test_unwritten_reads_default() {
        let store = ClientConfigurationStore::new();
        let identity = peer("00:11:22:33:44:55");
        assert_eq!(store.read(&Uuid::from_u16(0x2A19), &identity), CCC_DEFAULT);
        assert_eq!(store.read(&Uuid::from_u16(0x2A37), &identity), 0x0000);
        // The entry set is created lazily on first access
        assert!(store.contains(&identity));
    }

    #[test]
    fn test_write_then_read() {
        let store = ClientConfigurationStore::new();
        let identity = peer("00:11:22:33:44:55");
        let other = peer("00:11:22:33:44:66");
        let uuid = Uuid::from_u16(0x2A19);

        store.write(&uuid, &identity, ClientConfiguration::NOTIFICATION.bits());
        assert_eq!(store.read(&uuid, &identity), 0x0001);
        store.write(&uuid, &identity, 0x0003);
        assert_eq!(store.read(&uuid, &identity), 0x0003);
        assert_eq!(store.read(&uuid, &other), CCC_DEFAULT);
    }

    #[test]
    fn test_bonded_identity_is_retained() {
        let store = ClientConfigurationStore::new();
        let identity = peer("00:11:22:33:44:55");
        store.write(&Uuid::from_u16(0x2A19), &identity, 0x0001);
        store.write(&Uuid::from_u16(0x2A37), &identity, 0x0002);

        assert!(store.on_disconnect(&identity, true, true));
        assert_eq!(store.read(&Uuid::from_u16(0x2A19), &identity), 0x0001);
        assert_eq!(store.read(&Uuid::from_u16(0x2A37), &identity), 0x0002);
    }

    #[test]
    fn test_purged_unless_bonded_identity() {
        let store = ClientConfigurationStore::new();
        let uuid = Uuid::from_u16(0x2A19);

        for (bonded, identity_address) in [(false, true), (false, false), (true, false)] {
            let identity = peer("00:11:22:33:44:55");
            store.write(&uuid, &identity, 0x0001);
            assert!(!store.on_disconnect(&identity, bonded, identity_address));
            assert!(!store.contains(&identity));
            assert_eq!(store.read(&uuid, &identity), CCC_DEFAULT);
        }
    }
}
