//! SubEvent and Event header word layouts
//!
//! Both headers are three little-endian 64-bit words with named bit ranges.
//! Field access is explicit shift/mask arithmetic; the words are never
//! reinterpreted as language-level records.
//!
//! ```text
//! SubEventHeader                          EventHeader
//! word 0  [24:0]  inclusive byte count    word 0  [24:0]  inclusive byte count
//! word 1  [31:0]  event tag low 32        word 1  [31:0]  event tag low 32
//!         [47:32] event tag high 16               [47:32] event tag high 16
//!         [55:48] source device id                [55:48] device count
//!         [63:56] subsystem id                    [63:56] header version
//! word 2  bytes 0-5 per-link status       word 2  bytes 0-4 event mode
//!         byte 6    format version                byte 5   event status
//!         byte 7    block counter                 byte 6   partition id
//!                                                 byte 7   EVB mode
//! ```

use crate::protocol::constants::{ProtocolError, EVENT_WINDOW_TAG_MASK};
use byteorder::{ByteOrder, LittleEndian};

const BYTE_COUNT_BITS: u32 = 25;
const BYTE_COUNT_MASK: u64 = (1 << BYTE_COUNT_BITS) - 1;

/// Number of hardware links per data-transfer controller
pub const LINKS_PER_DEVICE: usize = 6;

fn read_word(bytes: &[u8], index: usize) -> u64 {
    LittleEndian::read_u64(&bytes[index * 8..index * 8 + 8])
}

fn write_word(bytes: &mut [u8], index: usize, word: u64) {
    LittleEndian::write_u64(&mut bytes[index * 8..index * 8 + 8], word);
}

/// Header framing all DataBlocks from one source device for one event window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubEventHeader {
    /// Inclusive byte count (header + all DataBlocks), 25 bits
    pub inclusive_byte_count: u32,
    /// 48-bit event window tag
    pub event_window_tag: u64,
    /// Source device (DTC) id
    pub source_id: u8,
    /// Subsystem id (raw 8-bit field)
    pub subsystem_id: u8,
    /// Per-link status bytes
    pub link_status: [u8; LINKS_PER_DEVICE],
    /// Header format version
    pub version: u8,
    /// Round-robin block counter
    pub block_counter: u8,
}

impl SubEventHeader {
    /// Encoded header size in bytes
    pub const SIZE: usize = 24;

    /// Create an empty header for incremental building
    pub fn new(event_window_tag: u64, source_id: u8) -> Self {
        Self {
            inclusive_byte_count: Self::SIZE as u32,
            event_window_tag: event_window_tag & EVENT_WINDOW_TAG_MASK,
            source_id,
            subsystem_id: 0,
            link_status: [0; LINKS_PER_DEVICE],
            version: crate::protocol::constants::FORMAT_VERSION,
            block_counter: 0,
        }
    }

    /// Decode the header from the leading 24 bytes of a SubEvent region
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: bytes.len(),
            });
        }

        let word0 = read_word(bytes, 0);
        let word1 = read_word(bytes, 1);

        let mut link_status = [0u8; LINKS_PER_DEVICE];
        link_status.copy_from_slice(&bytes[16..16 + LINKS_PER_DEVICE]);

        Ok(Self {
            inclusive_byte_count: (word0 & BYTE_COUNT_MASK) as u32,
            event_window_tag: word1 & EVENT_WINDOW_TAG_MASK,
            source_id: ((word1 >> 48) & 0xFF) as u8,
            subsystem_id: ((word1 >> 56) & 0xFF) as u8,
            link_status,
            version: bytes[22],
            block_counter: bytes[23],
        })
    }

    /// Encode the header into the leading 24 bytes of `out`
    pub fn write_to(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        if out.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: out.len(),
            });
        }
        if u64::from(self.inclusive_byte_count) > BYTE_COUNT_MASK {
            return Err(ProtocolError::FieldOutOfRange {
                field: "inclusive_byte_count",
                value: self.inclusive_byte_count as u64,
                max: BYTE_COUNT_MASK,
            });
        }
        if self.event_window_tag > EVENT_WINDOW_TAG_MASK {
            return Err(ProtocolError::FieldOutOfRange {
                field: "event_window_tag",
                value: self.event_window_tag,
                max: EVENT_WINDOW_TAG_MASK,
            });
        }

        write_word(out, 0, self.inclusive_byte_count as u64);
        write_word(
            out,
            1,
            self.event_window_tag
                | (self.source_id as u64) << 48
                | (self.subsystem_id as u64) << 56,
        );
        out[16..16 + LINKS_PER_DEVICE].copy_from_slice(&self.link_status);
        out[22] = self.version;
        out[23] = self.block_counter;
        Ok(())
    }

    /// Bytes of DataBlock payload following the header
    pub fn block_byte_count(&self) -> usize {
        (self.inclusive_byte_count as usize).saturating_sub(Self::SIZE)
    }

    /// Validate internal consistency of a parsed header
    pub fn validate(&self) -> crate::Result<()> {
        if (self.inclusive_byte_count as usize) < Self::SIZE {
            return Err(anyhow::anyhow!(
                "SubEvent inclusive byte count {} smaller than header size {}",
                self.inclusive_byte_count,
                Self::SIZE
            ));
        }
        Ok(())
    }
}

/// Header framing all SubEvents from all devices for one event window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    /// Inclusive byte count (header + all SubEvents), 25 bits
    pub inclusive_byte_count: u32,
    /// 48-bit event window tag
    pub event_window_tag: u64,
    /// Number of contributing devices (DTCs)
    pub num_devices: u8,
    /// Header format version
    pub version: u8,
    /// 5-byte event mode vector
    pub event_mode: [u8; 5],
    /// Event status byte
    pub status: u8,
    /// Partition identifier
    pub partition_id: u8,
    /// Event-builder mode byte
    pub evb_mode: u8,
}

impl EventHeader {
    /// Encoded header size in bytes
    pub const SIZE: usize = 24;

    /// Create an empty header for incremental building
    pub fn new(event_window_tag: u64) -> Self {
        Self {
            inclusive_byte_count: Self::SIZE as u32,
            event_window_tag: event_window_tag & EVENT_WINDOW_TAG_MASK,
            num_devices: 0,
            version: crate::protocol::constants::FORMAT_VERSION,
            event_mode: [0; 5],
            status: 0,
            partition_id: 0,
            evb_mode: 0,
        }
    }

    /// Decode the header from the leading 24 bytes of an Event region
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: bytes.len(),
            });
        }

        let word0 = read_word(bytes, 0);
        let word1 = read_word(bytes, 1);

        let mut event_mode = [0u8; 5];
        event_mode.copy_from_slice(&bytes[16..21]);

        Ok(Self {
            inclusive_byte_count: (word0 & BYTE_COUNT_MASK) as u32,
            event_window_tag: word1 & EVENT_WINDOW_TAG_MASK,
            num_devices: ((word1 >> 48) & 0xFF) as u8,
            version: ((word1 >> 56) & 0xFF) as u8,
            event_mode,
            status: bytes[21],
            partition_id: bytes[22],
            evb_mode: bytes[23],
        })
    }

    /// Encode the header into the leading 24 bytes of `out`
    pub fn write_to(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        if out.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: out.len(),
            });
        }
        if u64::from(self.inclusive_byte_count) > BYTE_COUNT_MASK {
            return Err(ProtocolError::FieldOutOfRange {
                field: "inclusive_byte_count",
                value: self.inclusive_byte_count as u64,
                max: BYTE_COUNT_MASK,
            });
        }
        if self.event_window_tag > EVENT_WINDOW_TAG_MASK {
            return Err(ProtocolError::FieldOutOfRange {
                field: "event_window_tag",
                value: self.event_window_tag,
                max: EVENT_WINDOW_TAG_MASK,
            });
        }

        write_word(out, 0, self.inclusive_byte_count as u64);
        write_word(
            out,
            1,
            self.event_window_tag
                | (self.num_devices as u64) << 48
                | (self.version as u64) << 56,
        );
        out[16..21].copy_from_slice(&self.event_mode);
        out[21] = self.status;
        out[22] = self.partition_id;
        out[23] = self.evb_mode;
        Ok(())
    }

    /// Bytes of SubEvent payload following the header
    pub fn sub_event_byte_count(&self) -> usize {
        (self.inclusive_byte_count as usize).saturating_sub(Self::SIZE)
    }

    /// Validate internal consistency of a parsed header
    pub fn validate(&self) -> crate::Result<()> {
        if (self.inclusive_byte_count as usize) < Self::SIZE {
            return Err(anyhow::anyhow!(
                "Event inclusive byte count {} smaller than header size {}",
                self.inclusive_byte_count,
                Self::SIZE
            ));
        }
        Ok(())
    }
}
