//! Cosmic-ray-veto payload walker
//!
//! The controller-status header declares the block's total word count;
//! decoding loops extracting hit-info headers and 8-bit waveform tails until
//! that count is consumed. A hit whose declared tail would read past the
//! declared end flags the block corrupted and returns the hits parsed so far.

use crate::block::DataBlockView;
use tracing::warn;
use types::protocol::payload::crv::{CrvControllerStatus, CrvHitHeader};
use types::Subsystem;

/// One decoded CRV hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrvHit {
    pub header: CrvHitHeader,
    pub samples: Vec<u8>,
}

/// Decoded CRV DataBlock
#[derive(Debug, Clone, Default)]
pub struct CrvBlock {
    pub status: Option<CrvControllerStatus>,
    pub hits: Vec<CrvHit>,
    pub corrupted: bool,
}

/// Walk a CRV DataBlock payload
pub fn decode_crv_block(block: &DataBlockView<'_>) -> CrvBlock {
    if block.subsystem_id() != Subsystem::CosmicRayVeto as u8 {
        warn!(
            subsystem_id = block.subsystem_id(),
            expected = Subsystem::CosmicRayVeto as u8,
            "CRV decoder fed a block from another subsystem"
        );
    }

    let payload = block.payload();
    let mut decoded = CrvBlock::default();

    let status = match CrvControllerStatus::parse(payload) {
        Ok(status) => status,
        Err(error) => {
            warn!(%error, available = payload.len(), "unreadable CRV controller status");
            decoded.corrupted = true;
            return decoded;
        }
    };
    let declared_end = status.byte_count();
    decoded.status = Some(status);

    // The declared word count is the walk's authority; when it exceeds the
    // bytes actually present, every offset past the status header is suspect.
    if declared_end > payload.len() {
        warn!(
            declared = declared_end,
            available = payload.len(),
            "CRV declared word count exceeds the payload"
        );
        decoded.corrupted = true;
        return decoded;
    }

    let mut offset = CrvControllerStatus::SIZE;
    while offset < declared_end {
        if declared_end - offset < CrvHitHeader::SIZE {
            warn!(
                offset,
                declared = declared_end,
                hits = decoded.hits.len(),
                "CRV block ends inside a hit header"
            );
            decoded.corrupted = true;
            break;
        }
        let header = match CrvHitHeader::parse(&payload[offset..]) {
            Ok(header) => header,
            Err(error) => {
                warn!(%error, offset, "unreadable CRV hit header");
                decoded.corrupted = true;
                break;
            }
        };

        let record_size = header.record_size();
        if offset + record_size > declared_end {
            warn!(
                offset,
                record_size,
                declared = declared_end,
                hits = decoded.hits.len(),
                "CRV waveform overruns the declared block end"
            );
            decoded.corrupted = true;
            break;
        }

        let wave_start = offset + CrvHitHeader::SIZE;
        let samples = payload[wave_start..wave_start + header.sample_count as usize].to_vec();
        decoded.hits.push(CrvHit { header, samples });
        offset += record_size;
    }

    decoded
}

/// Serialize a controller status and hits into a CRV payload (test and build aid)
///
/// The status header's word count is restamped from the actual content.
pub fn encode_crv_payload(status: &CrvControllerStatus, hits: &[CrvHit]) -> Vec<u8> {
    let mut payload = vec![0u8; CrvControllerStatus::SIZE];
    for hit in hits {
        let mut stamped = hit.header;
        stamped.sample_count = hit.samples.len() as u16;
        let mut header = [0u8; CrvHitHeader::SIZE];
        stamped.write_to(&mut header).expect("crv header encode");
        payload.extend_from_slice(&header);
        payload.extend_from_slice(&hit.samples);
        if payload.len() % 2 != 0 {
            payload.push(0);
        }
    }
    let mut restamped = *status;
    restamped.event_word_count = (payload.len() / 2) as u16;
    restamped
        .write_to(&mut payload[..CrvControllerStatus::SIZE])
        .expect("crv status encode");
    payload
}
