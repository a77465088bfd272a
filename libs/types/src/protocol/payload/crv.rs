//! Cosmic-ray-veto hit records
//!
//! A CRV DataBlock payload opens with a controller-status header declaring a
//! total word count (16-bit words, header inclusive). Hits follow until the
//! declared count is consumed: a 6-byte hit-info header, then `sample_count`
//! 8-bit waveform samples padded to a 2-byte word boundary.

use crate::protocol::constants::{ProtocolError, EVENT_WINDOW_TAG_MASK};

/// CRV block sizes are counted in 16-bit words
pub const WORD_BYTES: usize = 2;

/// Controller status header (16 bytes)
///
/// ```text
/// 0     controller id
/// 1     status
/// 2-3   controller event word count u16 (16-bit words, header inclusive)
/// 4-9   48-bit event window tag
/// 10-13 active-FEB bitmap u32
/// 14-15 reserved zero
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrvControllerStatus {
    pub controller_id: u8,
    pub status: u8,
    pub event_word_count: u16,
    pub event_window_tag: u64,
    pub active_feb_flags: u32,
}

impl CrvControllerStatus {
    /// Encoded header size in bytes
    pub const SIZE: usize = 16;

    /// Decode the controller status header
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: bytes.len(),
            });
        }
        let mut tag = [0u8; 8];
        tag[..6].copy_from_slice(&bytes[4..10]);
        Ok(Self {
            controller_id: bytes[0],
            status: bytes[1],
            event_word_count: u16::from_le_bytes([bytes[2], bytes[3]]),
            event_window_tag: u64::from_le_bytes(tag),
            active_feb_flags: u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]),
        })
    }

    /// Encode the controller status header
    pub fn write_to(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        if out.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: out.len(),
            });
        }
        if self.event_window_tag > EVENT_WINDOW_TAG_MASK {
            return Err(ProtocolError::FieldOutOfRange {
                field: "event_window_tag",
                value: self.event_window_tag,
                max: EVENT_WINDOW_TAG_MASK,
            });
        }
        out[..Self::SIZE].fill(0);
        out[0] = self.controller_id;
        out[1] = self.status;
        out[2..4].copy_from_slice(&self.event_word_count.to_le_bytes());
        out[4..10].copy_from_slice(&self.event_window_tag.to_le_bytes()[..6]);
        out[10..14].copy_from_slice(&self.active_feb_flags.to_le_bytes());
        Ok(())
    }

    /// Declared block length in bytes, header inclusive
    pub fn byte_count(&self) -> usize {
        self.event_word_count as usize * WORD_BYTES
    }
}

/// Per-hit info header (6 bytes)
///
/// ```text
/// 0-1  channel u16 ([15:8] FEB, [7:0] SiPM)
/// 2-3  hit time u16
/// 4-5  sample count u16
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrvHitHeader {
    pub channel: u16,
    pub hit_time: u16,
    pub sample_count: u16,
}

impl CrvHitHeader {
    /// Encoded header size in bytes
    pub const SIZE: usize = 6;

    pub fn feb(&self) -> u8 {
        (self.channel >> 8) as u8
    }

    pub fn sipm(&self) -> u8 {
        (self.channel & 0xFF) as u8
    }

    /// Decode a hit-info header
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: bytes.len(),
            });
        }
        Ok(Self {
            channel: u16::from_le_bytes([bytes[0], bytes[1]]),
            hit_time: u16::from_le_bytes([bytes[2], bytes[3]]),
            sample_count: u16::from_le_bytes([bytes[4], bytes[5]]),
        })
    }

    /// Encode a hit-info header
    pub fn write_to(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        if out.len() < Self::SIZE {
            return Err(ProtocolError::HeaderTooSmall {
                need: Self::SIZE,
                got: out.len(),
            });
        }
        out[0..2].copy_from_slice(&self.channel.to_le_bytes());
        out[2..4].copy_from_slice(&self.hit_time.to_le_bytes());
        out[4..6].copy_from_slice(&self.sample_count.to_le_bytes());
        Ok(())
    }

    /// On-wire size of this hit including its waveform, padded to a word boundary
    pub fn record_size(&self) -> usize {
        let raw = Self::SIZE + self.sample_count as usize;
        raw + (raw % WORD_BYTES)
    }
}
