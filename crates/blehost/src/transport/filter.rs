//! HCI socket filter
//!
//! Mirrors the kernel's `struct hci_filter`: a packet-type mask, a 64-bit
//! event mask split over two 32-bit words, and an opcode, all little-endian.

use super::constants::*;
use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HciFilter {
    pub type_mask: u32,
    pub event_mask: [u32; 2],
    pub opcode: u16,
}

impl HciFilter {
    pub const fn new() -> Self {
        Self {
            type_mask: 0,
            event_mask: [0; 2],
            opcode: 0,
        }
    }

    /// Event and ACL packets; disconnection, encryption change, command
    /// complete/status, completed packets and LE meta events.
    pub fn host_default() -> Self {
        Self::new()
            .packet_type(HCI_EVENT_PKT)
            .packet_type(HCI_ACL_PKT)
            .event(EVT_DISCONN_COMPLETE)
            .event(EVT_ENCRYPTION_CHANGE)
            .event(EVT_CMD_COMPLETE)
            .event(EVT_CMD_STATUS)
            .event(EVT_NUM_COMP_PKTS)
            .event(EVT_LE_META_EVENT)
    }

    /// Passes packets whose type tag is `packet_type`.
    pub const fn packet_type(mut self, packet_type: u8) -> Self {
        self.type_mask |= 1 << (packet_type & 0x1F);
        self
    }

    /// Passes events with code `event_code`.
    pub const fn event(mut self, event_code: u8) -> Self {
        let code = event_code & 0x3F;
        self.event_mask[(code >> 5) as usize] |= 1 << (code & 0x1F);
        self
    }

    pub const fn opcode(mut self, opcode: u16) -> Self {
        self.opcode = opcode;
        self
    }

    pub fn to_bytes(&self) -> [u8; HCI_FILTER_LEN] {
        let mut bytes = [0u8; HCI_FILTER_LEN];
        LittleEndian::write_u32(&mut bytes[0..4], self.type_mask);
        LittleEndian::write_u32(&mut bytes[4..8], self.event_mask[0]);
        LittleEndian::write_u32(&mut bytes[8..12], self.event_mask[1]);
        LittleEndian::write_u16(&mut bytes[12..14], self.opcode);
        bytes
    }
}
