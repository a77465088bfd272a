//! DMA Header Implementation
//!
//! The DMA header is the 4-byte prefix of every packet except raw data and
//! carries routing and validation information for the enclosing block.
//!
//! **CRITICAL**: The layout is fixed by hardware and must be reproduced
//! bit-exact:
//!
//! ```text
//! byte 0-1   byte count of the enclosing block (u16 LE)
//! byte 2     [7:4] packet type tag   [3:0] hop count
//! byte 3     [7] valid   [6:4] subsystem id   [2:0] link id
//! ```
//!
//! All field access is shift/mask arithmetic over the byte slice; the header
//! is never produced by reinterpreting the byte region as a struct.

use crate::protocol::constants::{ProtocolError, Subsystem, PACKET_SIZE};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

/// Packet type tag carried in the high nibble of byte 2
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize,
)]
pub enum PacketType {
    ConfigRequest = 0,
    Heartbeat = 1,
    DataRequest = 2,
    ConfigReply = 4,
    DataHeader = 5,
    Invalid = 8,
}

impl PacketType {
    /// Human-readable name for logs and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            PacketType::ConfigRequest => "ConfigRequest",
            PacketType::Heartbeat => "Heartbeat",
            PacketType::DataRequest => "DataRequest",
            PacketType::ConfigReply => "ConfigReply",
            PacketType::DataHeader => "DataHeader",
            PacketType::Invalid => "Invalid",
        }
    }
}

/// Decoded DMA header
///
/// `subsystem` and `link` are stored as raw field values; use
/// [`DmaHeader::subsystem`] for the typed view. The hardware allows 3-bit
/// subsystem ids the software enumeration does not cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaHeader {
    /// Inclusive byte count of the enclosing block; always a positive multiple of 16
    pub byte_count: u16,
    /// Validity flag (byte 3, bit 7)
    pub valid: bool,
    /// Packet type tag (byte 2, high nibble)
    pub packet_type: PacketType,
    /// Link/channel id, 3 bits
    pub link: u8,
    /// Subsystem id, 3 bits (raw)
    pub subsystem_id: u8,
    /// Hop count, 4 bits
    pub hop_count: u8,
}

impl DmaHeader {
    /// Encoded header size in bytes
    pub const SIZE: usize = 4;

    /// Create a header for a fresh single packet (byte count 16, valid)
    pub fn new(packet_type: PacketType, subsystem: Subsystem, link: u8) -> Self {
        Self {
            byte_count: PACKET_SIZE as u16,
            valid: true,
            packet_type,
            link,
            subsystem_id: subsystem as u8,
            hop_count: 0,
        }
    }

    /// Decode the header from the first four bytes of a packet
    ///
    /// Validation is eager: the byte count must be a positive multiple of 16
    /// and the type tag must be a known enumeration value.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: bytes.len(),
            });
        }

        let byte_count = u16::from_le_bytes([bytes[0], bytes[1]]);
        if byte_count == 0 || byte_count % PACKET_SIZE as u16 != 0 {
            return Err(ProtocolError::InvalidByteCount(byte_count));
        }

        let type_tag = bytes[2] >> 4;
        let packet_type = PacketType::try_from_primitive(type_tag)
            .map_err(|_| ProtocolError::InvalidPacketType(type_tag))?;

        Ok(Self {
            byte_count,
            valid: bytes[3] & 0x80 != 0,
            packet_type,
            link: bytes[3] & 0x07,
            subsystem_id: (bytes[3] >> 4) & 0x07,
            hop_count: bytes[2] & 0x0F,
        })
    }

    /// Encode the header into the first four bytes of `out`
    pub fn write_to(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        if out.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: out.len(),
            });
        }
        if self.byte_count == 0 || self.byte_count % PACKET_SIZE as u16 != 0 {
            return Err(ProtocolError::InvalidByteCount(self.byte_count));
        }
        if self.link > 0x07 {
            return Err(ProtocolError::FieldOutOfRange {
                field: "link",
                value: self.link as u64,
                max: 0x07,
            });
        }
        if self.subsystem_id > 0x07 {
            return Err(ProtocolError::FieldOutOfRange {
                field: "subsystem_id",
                value: self.subsystem_id as u64,
                max: 0x07,
            });
        }
        if self.hop_count > 0x0F {
            return Err(ProtocolError::FieldOutOfRange {
                field: "hop_count",
                value: self.hop_count as u64,
                max: 0x0F,
            });
        }

        out[..2].copy_from_slice(&self.byte_count.to_le_bytes());
        out[2] = ((self.packet_type as u8) << 4) | self.hop_count;
        out[3] = ((self.valid as u8) << 7) | (self.subsystem_id << 4) | self.link;
        Ok(())
    }

    /// Get the typed subsystem for this header
    pub fn subsystem(&self) -> Result<Subsystem, ProtocolError> {
        Subsystem::try_from(self.subsystem_id)
    }

    /// Number of 16-byte packets the enclosing block spans
    pub fn packet_span(&self) -> usize {
        self.byte_count as usize / PACKET_SIZE
    }
}
