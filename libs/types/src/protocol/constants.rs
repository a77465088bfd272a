//! Protocol constants and basic types
//!
//! These are fundamental data types that should remain in the types crate
//! to avoid circular dependencies. Parsing policy remains in codec.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use thiserror::Error;

/// Size of one hardware packet in bytes
pub const PACKET_SIZE: usize = 16;

/// Upper bound on one DMA transport buffer, size-prefix words included
pub const MAX_DMA_SIZE: usize = 0x8000;

/// Sentinel closing the container-fragment index
pub const CONTAINER_MAGIC: u64 = 0x00BA_DDEE_D5B1_BEE5;

/// Current header format version
pub const FORMAT_VERSION: u8 = 1;

/// Event window tags occupy 48 bits
pub const EVENT_WINDOW_TAG_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Detector subsystem enumeration for DataBlock attribution
///
/// Carried in a 3-bit field of the DMA header (byte 3, bits 4-6).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subsystem {
    Tracker = 0,
    Calorimeter = 1,
    CosmicRayVeto = 2,
}

impl Subsystem {
    /// Fixed walk order used by the container fragment writer
    pub const ALL: [Subsystem; 3] = [
        Subsystem::Tracker,
        Subsystem::Calorimeter,
        Subsystem::CosmicRayVeto,
    ];

    /// Human-readable name for logs and tooling
    pub fn name(&self) -> &'static str {
        match self {
            Subsystem::Tracker => "Tracker",
            Subsystem::Calorimeter => "Calorimeter",
            Subsystem::CosmicRayVeto => "CosmicRayVeto",
        }
    }
}

impl TryFrom<u8> for Subsystem {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Subsystem::Tracker),
            1 => Ok(Subsystem::Calorimeter),
            2 => Ok(Subsystem::CosmicRayVeto),
            _ => Err(ProtocolError::InvalidSubsystem(value)),
        }
    }
}

impl From<Subsystem> for u8 {
    fn from(subsystem: Subsystem) -> Self {
        subsystem as u8
    }
}

/// Wire-format errors raised while interpreting header fields
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid packet type tag: {0}")]
    InvalidPacketType(u8),

    #[error("Invalid subsystem id: {0}")]
    InvalidSubsystem(u8),

    #[error("Header too small: need {need} bytes, got {got}")]
    HeaderTooSmall { need: usize, got: usize },

    #[error("Invalid byte count {0}: must be a positive multiple of 16")]
    InvalidByteCount(u16),

    #[error("Field out of range: {field} = {value} exceeds {max}")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
}
