//! Advertising and scan response payloads
//!
//! Payloads travel on the wire as a sequence of `[length][type][data]`
//! structures and are handed to applications as an ordered field list.

use crate::uuid::Uuid;
use bitflags::bitflags;
use thiserror::Error;

// Advertising Data Types
pub const ADV_TYPE_FLAGS: u8 = 0x01;
pub const ADV_TYPE_16BIT_SERVICE_UUID_PARTIAL: u8 = 0x02;
pub const ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE: u8 = 0x03;
pub const ADV_TYPE_32BIT_SERVICE_UUID_PARTIAL: u8 = 0x04;
pub const ADV_TYPE_32BIT_SERVICE_UUID_COMPLETE: u8 = 0x05;
pub const ADV_TYPE_128BIT_SERVICE_UUID_PARTIAL: u8 = 0x06;
pub const ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE: u8 = 0x07;
pub const ADV_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
pub const ADV_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const ADV_TYPE_TX_POWER_LEVEL: u8 = 0x0A;
pub const ADV_TYPE_SLAVE_CONNECTION_INTERVAL_RANGE: u8 = 0x12;
pub const ADV_TYPE_SERVICE_DATA_16BIT: u8 = 0x16;
pub const ADV_TYPE_APPEARANCE: u8 = 0x19;
pub const ADV_TYPE_MANUFACTURER_SPECIFIC: u8 = 0xFF;

/// Legacy advertising and scan response payloads are capped at 31 bytes.
pub const MAX_ADVERTISING_DATA_LEN: usize = 31;

bitflags! {
    /// Contents of the Flags AD structure
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdFlags: u8 {
        const LE_LIMITED_DISCOVERABLE = 0x01;
        const LE_GENERAL_DISCOVERABLE = 0x02;
        const BR_EDR_NOT_SUPPORTED = 0x04;
        const SIMULTANEOUS_LE_BR_EDR_CONTROLLER = 0x08;
        const SIMULTANEOUS_LE_BR_EDR_HOST = 0x10;
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdvertisingError {
    #[error("Advertising payload is {0} bytes, limit is 31")]
    TooLong(usize),

    #[error("AD structure 0x{ad_type:02X} carries {len} bytes, which does not fit a length octet")]
    FieldTooLong { ad_type: u8, len: usize },
}

/// A single AD structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdStructure {
    Flags(AdFlags),
    IncompleteServiceUuids16(Vec<u16>),
    CompleteServiceUuids16(Vec<u16>),
    IncompleteServiceUuids32(Vec<u32>),
    CompleteServiceUuids32(Vec<u32>),
    IncompleteServiceUuids128(Vec<Uuid>),
    CompleteServiceUuids128(Vec<Uuid>),
    ShortenedLocalName(String),
    CompleteLocalName(String),
    TxPowerLevel(i8),
    SlaveConnectionIntervalRange { min: u16, max: u16 },
    ServiceData16 { uuid: u16, data: Vec<u8> },
    Appearance(u16),
    ManufacturerSpecific { company_id: u16, data: Vec<u8> },
    Unknown { ad_type: u8, data: Vec<u8> },
}

impl AdStructure {
    pub fn ad_type(&self) -> u8 {
        match self {
            Self::Flags(_) => ADV_TYPE_FLAGS,
            Self::IncompleteServiceUuids16(_) => ADV_TYPE_16BIT_SERVICE_UUID_PARTIAL,
            Self::CompleteServiceUuids16(_) => ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE,
            Self::IncompleteServiceUuids32(_) => ADV_TYPE_32BIT_SERVICE_UUID_PARTIAL,
            Self::CompleteServiceUuids32(_) => ADV_TYPE_32BIT_SERVICE_UUID_COMPLETE,
            Self::IncompleteServiceUuids128(_) => ADV_TYPE_128BIT_SERVICE_UUID_PARTIAL,
            Self::CompleteServiceUuids128(_) => ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE,
            Self::ShortenedLocalName(_) => ADV_TYPE_SHORT_LOCAL_NAME,
            Self::CompleteLocalName(_) => ADV_TYPE_COMPLETE_LOCAL_NAME,
            Self::TxPowerLevel(_) => ADV_TYPE_TX_POWER_LEVEL,
            Self::SlaveConnectionIntervalRange { .. } => ADV_TYPE_SLAVE_CONNECTION_INTERVAL_RANGE,
            Self::ServiceData16 { .. } => ADV_TYPE_SERVICE_DATA_16BIT,
            Self::Appearance(_) => ADV_TYPE_APPEARANCE,
            Self::ManufacturerSpecific { .. } => ADV_TYPE_MANUFACTURER_SPECIFIC,
            Self::Unknown { ad_type, .. } => *ad_type,
        }
    }

    /// The structure's data octets, without the length and type header
    fn data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        match self {
            Self::Flags(flags) => data.push(flags.bits()),
            Self::IncompleteServiceUuids16(uuids) | Self::CompleteServiceUuids16(uuids) => {
                for uuid in uuids {
                    data.extend_from_slice(&uuid.to_le_bytes());
                }
            }
            Self::IncompleteServiceUuids32(uuids) | Self::CompleteServiceUuids32(uuids) => {
                for uuid in uuids {
                    data.extend_from_slice(&uuid.to_le_bytes());
                }
            }
            Self::IncompleteServiceUuids128(uuids) | Self::CompleteServiceUuids128(uuids) => {
                for uuid in uuids {
                    data.extend_from_slice(uuid.as_bytes_le());
                }
            }
            Self::ShortenedLocalName(name) | Self::CompleteLocalName(name) => {
                data.extend_from_slice(name.as_bytes())
            }
            Self::TxPowerLevel(level) => data.push(*level as u8),
            Self::SlaveConnectionIntervalRange { min, max } => {
                data.extend_from_slice(&min.to_le_bytes());
                data.extend_from_slice(&max.to_le_bytes());
            }
            Self::ServiceData16 { uuid, data: payload } => {
                data.extend_from_slice(&uuid.to_le_bytes());
                data.extend_from_slice(payload);
            }
            Self::Appearance(appearance) => {
                data.extend_from_slice(&appearance.to_le_bytes());
            }
            Self::ManufacturerSpecific {
                company_id,
                data: payload,
            } => {
                data.extend_from_slice(&company_id.to_le_bytes());
                data.extend_from_slice(payload);
            }
            Self::Unknown { data: payload, .. } => data.extend_from_slice(payload),
        }
        data
    }

    /// Decodes one structure; malformed known types fall back to `Unknown`.
    fn decode(ad_type: u8, data: &[u8]) -> Self {
        let decoded = match ad_type {
            ADV_TYPE_FLAGS if data.len() == 1 => Some(Self::Flags(AdFlags::from_bits_retain(data[0]))),
            ADV_TYPE_16BIT_SERVICE_UUID_PARTIAL => u16_list(data).map(Self::IncompleteServiceUuids16),
            ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE => u16_list(data).map(Self::CompleteServiceUuids16),
            ADV_TYPE_32BIT_SERVICE_UUID_PARTIAL => u32_list(data).map(Self::IncompleteServiceUuids32),
            ADV_TYPE_32BIT_SERVICE_UUID_COMPLETE => u32_list(data).map(Self::CompleteServiceUuids32),
            ADV_TYPE_128BIT_SERVICE_UUID_PARTIAL => uuid128_list(data).map(Self::IncompleteServiceUuids128),
            ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE => uuid128_list(data).map(Self::CompleteServiceUuids128),
            ADV_TYPE_SHORT_LOCAL_NAME => {
                Some(Self::ShortenedLocalName(String::from_utf8_lossy(data).into_owned()))
            }
            ADV_TYPE_COMPLETE_LOCAL_NAME => {
                Some(Self::CompleteLocalName(String::from_utf8_lossy(data).into_owned()))
            }
            ADV_TYPE_TX_POWER_LEVEL if data.len() == 1 => Some(Self::TxPowerLevel(data[0] as i8)),
            ADV_TYPE_SLAVE_CONNECTION_INTERVAL_RANGE if data.len() == 4 => {
                Some(Self::SlaveConnectionIntervalRange {
                    min: u16::from_le_bytes([data[0], data[1]]),
                    max: u16::from_le_bytes([data[2], data[3]]),
                })
            }
            ADV_TYPE_SERVICE_DATA_16BIT if data.len() >= 2 => Some(Self::ServiceData16 {
                uuid: u16::from_le_bytes([data[0], data[1]]),
                data: data[2..].to_vec(),
            }),
            ADV_TYPE_APPEARANCE if data.len() == 2 => {
                Some(Self::Appearance(u16::from_le_bytes([data[0], data[1]])))
            }
            ADV_TYPE_MANUFACTURER_SPECIFIC if data.len() >= 2 => Some(Self::ManufacturerSpecific {
                company_id: u16::from_le_bytes([data[0], data[1]]),
                data: data[2..].to_vec(),
            }),
            _ => None,
        };

        decoded.unwrap_or_else(|| Self::Unknown {
            ad_type,
            data: data.to_vec(),
        })
    }
}

fn u16_list(data: &[u8]) -> Option<Vec<u16>> {
    if data.len() % 2 != 0 {
        return None;
    }
    Some(
        data.chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect(),
    )
}

fn u32_list(data: &[u8]) -> Option<Vec<u32>> {
    if data.len() % 4 != 0 {
        return None;
    }
    Some(
        data.chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn uuid128_list(data: &[u8]) -> Option<Vec<Uuid>> {
    if data.len() % 16 != 0 {
        return None;
    }
    data.chunks_exact(16).map(Uuid::try_from_slice_le).collect()
}

/// An advertising or scan response payload as an ordered field list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisingData {
    fields: Vec<AdStructure>,
}

impl AdvertisingData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: AdStructure) -> Self {
        self.fields.push(field);
        self
    }

    pub fn push(&mut self, field: AdStructure) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[AdStructure] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn local_name(&self) -> Option<&str> {
        self.fields.iter().find_map(|field| match field {
            AdStructure::CompleteLocalName(name) | AdStructure::ShortenedLocalName(name) => {
                Some(name.as_str())
            }
            _ => None,
        })
    }

    /// Serializes the field list into wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AdvertisingError> {
        let mut bytes = Vec::with_capacity(MAX_ADVERTISING_DATA_LEN);
        for field in &self.fields {
            let data = field.data();
            // Length octet covers the type octet as well
            if data.len() + 1 > u8::MAX as usize {
                return Err(AdvertisingError::FieldTooLong {
                    ad_type: field.ad_type(),
                    len: data.len(),
                });
            }
            bytes.push((data.len() + 1) as u8);
            bytes.push(field.ad_type());
            bytes.extend_from_slice(&data);
        }

        if bytes.len() > MAX_ADVERTISING_DATA_LEN {
            return Err(AdvertisingError::TooLong(bytes.len()));
        }
        Ok(bytes)
    }

    /// Parses wire bytes. A zero length octet ends the payload; a structure
    /// running past the end is dropped.
    pub fn parse(data: &[u8]) -> Self {
        let mut fields = Vec::new();
        let mut i = 0;

        while i < data.len() {
            let length = data[i] as usize;
            if length == 0 || i + length >= data.len() {
                break;
            }

            let ad_type = data[i + 1];
            fields.push(AdStructure::decode(ad_type, &data[i + 2..i + 1 + length]));

            i += 1 + length;
        }

        Self { fields }
    }
}

impl From<Vec<AdStructure>> for AdvertisingData {
    fn from(fields: Vec<AdStructure>) -> Self {
        Self { fields }
    }
}

/// A payload as delivered in a discovery record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdPayload {
    /// Wire bytes, left unparsed
    Raw(Vec<u8>),
    Fields(AdvertisingData),
}

impl AdPayload {
    pub fn fields(&self) -> Option<&AdvertisingData> {
        match self {
            AdPayload::Fields(data) => Some(data),
            AdPayload::Raw(_) => None,
        }
    }

    /// Replaces raw bytes with their parsed field list.
    pub fn parse_in_place(&mut self) {
        if let AdPayload::Raw(bytes) = self {
            *self = AdPayload::Fields(AdvertisingData::parse(bytes));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_fields() {
        let data = AdvertisingData::new()
            .with(AdStructure::Flags(
                AdFlags::LE_GENERAL_DISCOVERABLE | AdFlags::BR_EDR_NOT_SUPPORTED,
            ))
            .with(AdStructure::CompleteServiceUuids16(vec![0x180F]))
            .with(AdStructure::CompleteLocalName("blehost".into()));

        let bytes = data.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![
                0x02, 0x01, 0x06, // flags
                0x03, 0x03, 0x0F, 0x18, // battery service
                0x08, 0x09, b'b', b'l', b'e', b'h', b'o', b's', b't',
            ]
        );
        assert_eq!(AdvertisingData::parse(&bytes), data);
    }

    #[test]
    fn test_serialize_multi_octet_fields_little_endian() {
        let data = AdvertisingData::new()
            .with(AdStructure::CompleteServiceUuids32(vec![0x1234_5678]))
            .with(AdStructure::SlaveConnectionIntervalRange { min: 0x0006, max: 0x0C80 })
            .with(AdStructure::ServiceData16 {
                uuid: 0x180F,
                data: vec![0x64],
            })
            .with(AdStructure::Appearance(0x03C1))
            .with(AdStructure::ManufacturerSpecific {
                company_id: 0x004C,
                data: vec![0x02, 0x15],
            });

        assert_eq!(
            data.to_bytes().unwrap(),
            vec![
                0x05, 0x05, 0x78, 0x56, 0x34, 0x12, // 32-bit service UUID
                0x05, 0x12, 0x06, 0x00, 0x80, 0x0C, // interval range
                0x04, 0x16, 0x0F, 0x18, 0x64, // service data
                0x03, 0x19, 0xC1, 0x03, // appearance
                0x05, 0xFF, 0x4C, 0x00, 0x02, 0x15, // manufacturer
            ]
        );
    }

    #[test]
    fn test_payload_limit() {
        let data = AdvertisingData::new().with(AdStructure::CompleteLocalName("x".repeat(30)));
        assert_eq!(data.to_bytes(), Err(AdvertisingError::TooLong(32)));
    }

    #[test]
    fn test_parse_known_and_unknown() {
        let bytes = [
            0x05, 0xFF, 0x4C, 0x00, 0x01, 0x02, // manufacturer data
            0x03, 0x19, 0xC1, 0x03, // appearance
            0x02, 0x0A, 0xF4, // tx power -12
            0x03, 0x2A, 0xAA, 0xBB, // unknown type 0x2A
        ];
        let data = AdvertisingData::parse(&bytes);
        assert_eq!(
            data.fields(),
            &[
                AdStructure::ManufacturerSpecific {
                    company_id: 0x004C,
                    data: vec![0x01, 0x02]
                },
                AdStructure::Appearance(0x03C1),
                AdStructure::TxPowerLevel(-12),
                AdStructure::Unknown {
                    ad_type: 0x2A,
                    data: vec![0xAA, 0xBB]
                },
            ]
        );
    }

    #[test]
    fn test_parse_truncated_and_malformed() {
        // Odd-length 16-bit UUID list and a structure running off the end
        let bytes = [0x02, 0x03, 0x0F, 0x05, 0x09, b'a'];
        let data = AdvertisingData::parse(&bytes);
        assert_eq!(
            data.fields(),
            &[AdStructure::Unknown {
                ad_type: 0x03,
                data: vec![0x0F]
            }]
        );

        assert!(AdvertisingData::parse(&[0x00, 0x01, 0x02]).is_empty());
    }

    #[test]
    fn test_payload_parse_in_place() {
        let mut payload = AdPayload::Raw(vec![0x04, 0x08, b'a', b'b', b'c']);
        assert!(payload.fields().is_none());
        payload.parse_in_place();
        assert_eq!(payload.fields().and_then(|d| d.local_name()), Some("abc"));
    }
}
