//! Tracker payload walker
//!
//! Handles both on-wire format versions. Version 1 payloads are a sequence of
//! 16-byte hit headers each followed by its declared ADC packets. Version 0
//! payloads are a run of fixed 16-byte single-group records; each is upgraded
//! on read into the version-1 shape and cached in decoder-owned storage,
//! since the upgraded shape does not exist in the source bytes.

use crate::block::DataBlockView;
use tracing::warn;
use types::protocol::payload::tracker::{
    TrackerAdcPacket, TrackerHit, TrackerLegacyHit, SAMPLES_PER_PACKET,
};
use types::Subsystem;

/// A materialized tracker hit: version-1 header plus flattened samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerHitRecord {
    pub hit: TrackerHit,
    pub samples: Vec<u16>,
}

impl TrackerHitRecord {
    pub fn channel(&self) -> u16 {
        self.hit.channel
    }

    pub fn tdc0(&self) -> u16 {
        self.hit.tdc0
    }

    pub fn tdc1(&self) -> u16 {
        self.hit.tdc1
    }

    pub fn tot0(&self) -> u8 {
        self.hit.tot0
    }

    pub fn tot1(&self) -> u8 {
        self.hit.tot1
    }

    pub fn adc_packet_count(&self) -> u8 {
        self.hit.adc_packet_count
    }
}

/// Decoded tracker DataBlock
#[derive(Debug, Clone, Default)]
pub struct TrackerBlock {
    pub hits: Vec<TrackerHitRecord>,
    pub corrupted: bool,
}

/// Walk a tracker DataBlock payload
///
/// The header's format version selects the walk; version 0 records are
/// upgraded to the version-1 shape. Overruns flag the block corrupted and
/// return the hits parsed before the overrun point.
pub fn decode_tracker_block(block: &DataBlockView<'_>) -> TrackerBlock {
    if block.subsystem_id() != Subsystem::Tracker as u8 {
        warn!(
            subsystem_id = block.subsystem_id(),
            expected = Subsystem::Tracker as u8,
            "tracker decoder fed a block from another subsystem"
        );
    }

    let version = block.header().format_version;
    match version {
        0 => decode_legacy(block.payload()),
        1 => decode_v1(block.payload()),
        other => {
            warn!(
                version = other,
                "unknown tracker format version, walking as current version"
            );
            decode_v1(block.payload())
        }
    }
}

fn decode_v1(payload: &[u8]) -> TrackerBlock {
    let mut decoded = TrackerBlock::default();
    let mut offset = 0usize;

    while offset < payload.len() {
        if payload.len() - offset < TrackerHit::SIZE {
            warn!(
                offset,
                remaining = payload.len() - offset,
                hits = decoded.hits.len(),
                "tracker payload ends inside a hit header"
            );
            decoded.corrupted = true;
            break;
        }
        let hit = match TrackerHit::parse(&payload[offset..]) {
            Ok(hit) => hit,
            Err(error) => {
                warn!(%error, offset, "unreadable tracker hit header");
                decoded.corrupted = true;
                break;
            }
        };

        let record_size = hit.record_size();
        if offset + record_size > payload.len() {
            warn!(
                offset,
                record_size,
                available = payload.len() - offset,
                hits = decoded.hits.len(),
                "tracker waveform tail overruns the payload"
            );
            decoded.corrupted = true;
            break;
        }

        let mut samples = Vec::with_capacity(hit.adc_packet_count as usize * SAMPLES_PER_PACKET);
        let mut packet_at = offset + TrackerHit::SIZE;
        for _ in 0..hit.adc_packet_count {
            // Size was bounds-checked above, so parse cannot fail here
            if let Ok(packet) = TrackerAdcPacket::parse(&payload[packet_at..]) {
                samples.extend_from_slice(&packet.samples);
            }
            packet_at += TrackerAdcPacket::SIZE;
        }

        decoded.hits.push(TrackerHitRecord { hit, samples });
        offset += record_size;
    }

    decoded
}

fn decode_legacy(payload: &[u8]) -> TrackerBlock {
    let mut decoded = TrackerBlock::default();
    let mut offset = 0usize;

    while offset < payload.len() {
        if payload.len() - offset < TrackerLegacyHit::SIZE {
            warn!(
                offset,
                remaining = payload.len() - offset,
                hits = decoded.hits.len(),
                "legacy tracker payload ends inside a record"
            );
            decoded.corrupted = true;
            break;
        }
        let legacy = match TrackerLegacyHit::parse(&payload[offset..]) {
            Ok(record) => record,
            Err(error) => {
                warn!(%error, offset, "unreadable legacy tracker record");
                decoded.corrupted = true;
                break;
            }
        };

        let (hit, packet) = legacy.upgrade();
        decoded.hits.push(TrackerHitRecord {
            hit,
            samples: packet.samples.to_vec(),
        });
        offset += TrackerLegacyHit::SIZE;
    }

    decoded
}
