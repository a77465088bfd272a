//! Calorimeter payload walker
//!
//! Payload shape: u16 hit count, u16 reserved, `hit_count` hits (12-byte
//! readout header + `sample_count` 16-bit slots of 12-bit samples), then a
//! trailing board-status footer. The per-hit sample count drives both the
//! waveform length and the offset of the next hit.

use crate::block::DataBlockView;
use tracing::warn;
use types::protocol::payload::calorimeter::{CaloBoardStatus, CaloHitHeader, SAMPLE_MASK};
use types::Subsystem;

/// Bytes before the first hit: hit count word plus reserved word
const COUNT_HEADER_SIZE: usize = 4;

/// One decoded calorimeter hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaloHit {
    pub header: CaloHitHeader,
    pub samples: Vec<u16>,
}

/// Decoded calorimeter DataBlock
#[derive(Debug, Clone, Default)]
pub struct CaloBlock {
    pub hits: Vec<CaloHit>,
    pub board_status: Option<CaloBoardStatus>,
    pub corrupted: bool,
}

/// Walk a calorimeter DataBlock payload
///
/// Overruns flag the block corrupted and return the hits parsed before the
/// overrun point; the footer is only read after a clean hit walk.
pub fn decode_calorimeter_block(block: &DataBlockView<'_>) -> CaloBlock {
    if block.subsystem_id() != Subsystem::Calorimeter as u8 {
        warn!(
            subsystem_id = block.subsystem_id(),
            expected = Subsystem::Calorimeter as u8,
            "calorimeter decoder fed a block from another subsystem"
        );
    }

    let payload = block.payload();
    let mut decoded = CaloBlock::default();

    if payload.len() < COUNT_HEADER_SIZE {
        warn!(
            available = payload.len(),
            "calorimeter payload too short for hit count header"
        );
        decoded.corrupted = true;
        return decoded;
    }
    let hit_count = u16::from_le_bytes([payload[0], payload[1]]) as usize;

    let mut offset = COUNT_HEADER_SIZE;
    for ordinal in 0..hit_count {
        if payload.len() - offset < CaloHitHeader::SIZE {
            warn!(
                ordinal,
                offset,
                declared = hit_count,
                "calorimeter payload ends inside a readout header"
            );
            decoded.corrupted = true;
            return decoded;
        }
        let header = match CaloHitHeader::parse(&payload[offset..]) {
            Ok(header) => header,
            Err(error) => {
                warn!(%error, ordinal, offset, "unreadable calorimeter readout header");
                decoded.corrupted = true;
                return decoded;
            }
        };

        let record_size = header.record_size();
        if offset + record_size > payload.len() {
            warn!(
                ordinal,
                offset,
                record_size,
                available = payload.len() - offset,
                "calorimeter waveform overruns the payload"
            );
            decoded.corrupted = true;
            return decoded;
        }

        let wave = &payload[offset + CaloHitHeader::SIZE..offset + record_size];
        let mut samples: Vec<u16> = bytemuck::pod_collect_to_vec::<u8, u16>(wave);
        for sample in &mut samples {
            *sample &= SAMPLE_MASK;
        }

        decoded.hits.push(CaloHit { header, samples });
        offset += record_size;
    }

    if payload.len() - offset < CaloBoardStatus::SIZE {
        warn!(
            offset,
            available = payload.len() - offset,
            "calorimeter payload ends before the board status footer"
        );
        decoded.corrupted = true;
        return decoded;
    }
    match CaloBoardStatus::parse(&payload[offset..]) {
        Ok(footer) => decoded.board_status = Some(footer),
        Err(error) => {
            warn!(%error, offset, "unreadable calorimeter board status footer");
            decoded.corrupted = true;
        }
    }

    decoded
}

/// Serialize hits and footer into a calorimeter payload (test and build aid)
pub fn encode_calorimeter_payload(
    hits: &[CaloHit],
    footer: &CaloBoardStatus,
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&(hits.len() as u16).to_le_bytes());
    payload.extend_from_slice(&[0u8; 2]);
    for hit in hits {
        let mut header = [0u8; CaloHitHeader::SIZE];
        let mut stamped = hit.header;
        stamped.sample_count = hit.samples.len() as u16;
        stamped.write_to(&mut header).expect("calo header encode");
        payload.extend_from_slice(&header);
        for sample in &hit.samples {
            payload.extend_from_slice(&(sample & SAMPLE_MASK).to_le_bytes());
        }
    }
    let mut footer_bytes = [0u8; CaloBoardStatus::SIZE];
    footer.write_to(&mut footer_bytes).expect("calo footer encode");
    payload.extend_from_slice(&footer_bytes);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::DataBlock;
    use crate::packets::DataHeaderPacket;

    fn calo_hit(channel: u16, samples: Vec<u16>) -> CaloHit {
        CaloHit {
            header: CaloHitHeader {
                board_channel: channel,
                crystal_id: channel.wrapping_mul(3),
                time: 1000 + channel as u32,
                sample_count: samples.len() as u16,
                max_sample_index: 0,
                error_flags: 0,
            },
            samples,
        }
    }

    fn calo_block(payload: &[u8]) -> DataBlock {
        let header = DataHeaderPacket::new(0, Subsystem::Calorimeter, 5, 2);
        DataBlock::from_payload(header, payload).unwrap()
    }

    #[test]
    fn test_variable_waveforms_drive_offsets() {
        let hits = vec![
            calo_hit(1, vec![100, 200, 300]),
            calo_hit(2, (0..16).collect()),
            calo_hit(3, vec![]),
        ];
        let footer = CaloBoardStatus {
            board_id: 9,
            status: 1,
        };
        let payload = encode_calorimeter_payload(&hits, &footer);
        let block = calo_block(&payload);

        let decoded = decode_calorimeter_block(&block.view());
        assert!(!decoded.corrupted);
        assert_eq!(decoded.hits.len(), 3);
        assert_eq!(decoded.hits[0].samples, vec![100, 200, 300]);
        assert_eq!(decoded.hits[1].samples.len(), 16);
        assert!(decoded.hits[2].samples.is_empty());
        assert_eq!(decoded.board_status, Some(footer));
    }

    #[test]
    fn test_overrun_keeps_prior_hits() {
        let hits = vec![calo_hit(1, vec![7, 8]), calo_hit(2, vec![1; 64])];
        let footer = CaloBoardStatus {
            board_id: 0,
            status: 0,
        };
        let mut payload = encode_calorimeter_payload(&hits, &footer);
        // Chop the payload inside the second waveform
        payload.truncate(COUNT_HEADER_SIZE + 12 + 4 + 12 + 10);

        let decoded = decode_calorimeter_block(&calo_block(&payload).view());
        assert!(decoded.corrupted);
        assert_eq!(decoded.hits.len(), 1);
        assert_eq!(decoded.hits[0].samples, vec![7, 8]);
        assert!(decoded.board_status.is_none());
    }

    #[test]
    fn test_samples_masked_to_12_bits() {
        let mut payload = encode_calorimeter_payload(
            &[calo_hit(1, vec![0x0ABC])],
            &CaloBoardStatus {
                board_id: 1,
                status: 0,
            },
        );
        // Force high nibble garbage into the stored sample slot
        payload[COUNT_HEADER_SIZE + CaloHitHeader::SIZE + 1] |= 0xF0;
        let decoded = decode_calorimeter_block(&calo_block(&payload).view());
        assert_eq!(decoded.hits[0].samples[0], 0x0ABC);
    }

    #[test]
    fn test_missing_footer_flags_corruption() {
        let payload = {
            let mut p = encode_calorimeter_payload(
                &[calo_hit(4, vec![1, 2])],
                &CaloBoardStatus {
                    board_id: 0,
                    status: 0,
                },
            );
            p.truncate(p.len() - CaloBoardStatus::SIZE);
            p
        };
        let decoded = decode_calorimeter_block(&calo_block(&payload).view());
        assert!(decoded.corrupted);
        assert_eq!(decoded.hits.len(), 1);
    }
}
