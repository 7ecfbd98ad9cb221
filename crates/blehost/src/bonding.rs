//! Bonding records
//!
//! Pairing keys kept for bonded peers, indexed by identity address. The
//! in-memory store lives as long as the process; durable storage is left to
//! other `BondingStore` implementations.

use crate::address::DeviceAddress;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Long Term Key (LTK) information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongTermKey {
    pub key: [u8; 16],
    /// Encrypted diversifier, zero for Secure Connections keys
    pub ediv: u16,
    pub rand: [u8; 8],
    pub secure_connections: bool,
}

impl LongTermKey {
    pub fn new_secure_connections(key: [u8; 16]) -> Self {
        Self {
            key,
            ediv: 0,
            rand: [0; 8],
            secure_connections: true,
        }
    }
}

/// Everything remembered about a bonded peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bond {
    pub identity: DeviceAddress,
    pub ltk: Option<LongTermKey>,
    /// Identity Resolving Key
    pub irk: Option<[u8; 16]>,
    /// Keys were produced by an authenticated (MITM-protected) pairing
    pub authenticated: bool,
}

impl Bond {
    pub fn new(identity: DeviceAddress) -> Self {
        Self {
            identity,
            ltk: None,
            irk: None,
            authenticated: false,
        }
    }
}

/// Storage for bonding records, shared with the protocol engine
pub trait BondingStore: Send + Sync {
    fn save(&self, bond: Bond);

    fn load(&self, identity: &DeviceAddress) -> Option<Bond>;

    fn remove(&self, identity: &DeviceAddress) -> Option<Bond>;

    fn bonded_devices(&self) -> Vec<DeviceAddress>;

    fn clear(&self);
}

/// In-memory implementation of `BondingStore`
#[derive(Debug, Default)]
pub struct MemoryBondingStore {
    bonds: RwLock<HashMap<DeviceAddress, Bond>>,
}

impl MemoryBondingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BondingStore for MemoryBondingStore {
    fn save(&self, bond: Bond) {
        let mut bonds = self.bonds.write().unwrap_or_else(PoisonError::into_inner);
        bonds.insert(bond.identity, bond);
    }

    fn load(&self, identity: &DeviceAddress) -> Option<Bond> {
        let bonds = self.bonds.read().unwrap_or_else(PoisonError::into_inner);
        bonds.get(identity).cloned()
    }

    fn remove(&self, identity: &DeviceAddress) -> Option<Bond> {
        let mut bonds = self.bonds.write().unwrap_or_else(PoisonError::into_inner);
        bonds.remove(identity)
    }

    fn bonded_devices(&self) -> Vec<DeviceAddress> {
        let bonds = self.bonds.read().unwrap_or_else(PoisonError::into_inner);
        bonds.keys().copied().collect()
    }

    fn clear(&self) {
        self.bonds.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
