//! Bluetooth device addresses
//!
//! `BdAddr` keeps the six address bytes in the little-endian order used on
//! the HCI wire and prints them most-significant byte first.

use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// HCI address type tags
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;

// Sub-type bits of a random address (two most significant bits)
const RANDOM_SUBTYPE_MASK: u8 = 0xC0;
const RANDOM_STATIC: u8 = 0xC0;
const RANDOM_RESOLVABLE: u8 = 0x40;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid Bluetooth address string: {0}")]
pub struct AddressParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&slice[0..6]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Most significant byte, i.e. the first one printed.
    fn msb(&self) -> u8 {
        self.bytes[5]
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

impl FromStr for BdAddr {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(AddressParseError(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(AddressParseError(s.to_string()));
            }
            bytes[5 - i] =
                u8::from_str_radix(part, 16).map_err(|_| AddressParseError(s.to_string()))?;
        }

        Ok(Self { bytes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Public,
    Random,
}

impl AddressType {
    pub fn type_str(&self) -> &'static str {
        match self {
            AddressType::Public => "public",
            AddressType::Random => "random",
        }
    }
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        // Identity address tags (0x02, 0x03) collapse onto their base type
        if value & 0x01 == RANDOM_DEVICE_ADDRESS {
            AddressType::Random
        } else {
            AddressType::Public
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
        }
    }
}

/// A link-layer address together with its type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    pub addr: BdAddr,
    pub kind: AddressType,
}

impl DeviceAddress {
    pub const fn new(addr: BdAddr, kind: AddressType) -> Self {
        Self { addr, kind }
    }

    pub const fn public(addr: BdAddr) -> Self {
        Self::new(addr, AddressType::Public)
    }

    pub const fn random(addr: BdAddr) -> Self {
        Self::new(addr, AddressType::Random)
    }

    /// Generates a random static address.
    pub fn random_static() -> Self {
        loop {
            let mut bytes = [0u8; 6];
            rand::thread_rng().fill_bytes(&mut bytes);
            bytes[5] |= RANDOM_STATIC;
            let address = Self::random(BdAddr::new(bytes));
            if address.is_valid() {
                return address;
            }
        }
    }

    pub fn type_str(&self) -> &'static str {
        self.kind.type_str()
    }

    pub fn is_static(&self) -> bool {
        self.kind == AddressType::Random && self.addr.msb() & RANDOM_SUBTYPE_MASK == RANDOM_STATIC
    }

    pub fn is_resolvable(&self) -> bool {
        self.kind == AddressType::Random
            && self.addr.msb() & RANDOM_SUBTYPE_MASK == RANDOM_RESOLVABLE
    }

    /// Public and random static addresses identify a device; private
    /// addresses rotate and do not.
    pub fn is_identity(&self) -> bool {
        match self.kind {
            AddressType::Public => true,
            AddressType::Random => self.is_static(),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self.kind {
            AddressType::Public => {
                self.addr.bytes != [0x00; 6] && self.addr.bytes != [0xFF; 6]
            }
            AddressType::Random => {
                let mut random_part = self.addr.bytes;
                random_part[5] &= !RANDOM_SUBTYPE_MASK;
                let mut all_ones = [0xFF; 6];
                all_ones[5] &= !RANDOM_SUBTYPE_MASK;
                self.is_static() && random_part != [0x00; 6] && random_part != all_ones
            }
        }
    }

    /// Cache key naming this exact address record.
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey(format!("{}/{}", self.addr, self.type_str()))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.addr, self.type_str())
    }
}

/// `"<address>/<type>"`, used only as an in-memory cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&DeviceAddress> for IdentityKey {
    fn from(address: &DeviceAddress) -> Self {
        address.identity_key()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: BdAddr = "12:34:56:78:9A:BC".parse().unwrap();
        assert_eq!(addr.bytes, [0xBC, 0x9A, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(addr.to_string(), "12:34:56:78:9A:BC");

        assert!("12:34:56".parse::<BdAddr>().is_err());
        assert!("12:34:56:78:9A:ZZ".parse::<BdAddr>().is_err());
    }

    #[test]
    fn test_identity_key() {
        let addr: BdAddr = "12:34:56:78:9A:BC".parse().unwrap();
        let public = DeviceAddress::public(addr);
        let random = DeviceAddress::random(addr);

        assert_eq!(public.identity_key().as_str(), "12:34:56:78:9A:BC/public");
        assert_eq!(random.identity_key().as_str(), "12:34:56:78:9A:BC/random");
        assert_ne!(public, random);
    }

    #[test]
    fn test_identity_and_validity() {
        let public = DeviceAddress::public("00:11:22:33:44:55".parse().unwrap());
        assert!(public.is_identity());
        assert!(public.is_valid());
        assert!(!DeviceAddress::public(BdAddr::new([0; 6])).is_valid());
        assert!(!DeviceAddress::public(BdAddr::new([0xFF; 6])).is_valid());

        let static_addr = DeviceAddress::random("C1:22:33:44:55:66".parse().unwrap());
        assert!(static_addr.is_static());
        assert!(static_addr.is_identity());
        assert!(static_addr.is_valid());

        let resolvable = DeviceAddress::random("41:22:33:44:55:66".parse().unwrap());
        assert!(resolvable.is_resolvable());
        assert!(!resolvable.is_identity());
        assert!(!resolvable.is_valid());

        let all_ones = DeviceAddress::random(BdAddr::new([0xFF; 6]));
        assert!(!all_ones.is_valid());
    }

    #[test]
    fn test_random_static() {
        for _ in 0..32 {
            let address = DeviceAddress::random_static();
            assert!(address.is_static());
            assert!(address.is_valid());
        }
    }

    #[test]
    fn test_address_type_tags() {
        assert_eq!(AddressType::from(0x00), AddressType::Public);
        assert_eq!(AddressType::from(0x01), AddressType::Random);
        assert_eq!(AddressType::from(0x02), AddressType::Public);
        assert_eq!(AddressType::from(0x03), AddressType::Random);
        assert_eq!(u8::from(AddressType::Random), 0x01);
    }
}
