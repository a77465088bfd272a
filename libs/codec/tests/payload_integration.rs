//! # Detector Payload Integration Tests
//!
//! Decode detector payloads out of DataBlocks that traveled through the full
//! assembly and transport cycle, covering the fixed upgrade and corruption
//! scenarios.

use codec::payloads::calorimeter::encode_calorimeter_payload;
use codec::payloads::crv::encode_crv_payload;
use codec::{
    decode_calorimeter_block, decode_crv_block, decode_tracker_block, read_dma_buffers, CaloHit,
    CrvHit, DataBlock, DataHeaderPacket, Event, EventView, SubEvent,
};
use std::io::Cursor;
use types::protocol::payload::calorimeter::{CaloBoardStatus, CaloHitHeader};
use types::protocol::payload::crv::{CrvControllerStatus, CrvHitHeader};
use types::protocol::payload::tracker::TrackerLegacyHit;
use types::Subsystem;

const TAG: u64 = 0x0000_0BAD_CAFE;

fn wrap_in_event(blocks: Vec<DataBlock>) -> Vec<u8> {
    let mut sub_event = SubEvent::new(TAG, 1);
    for block in blocks {
        sub_event.add_block(block).unwrap();
    }
    let mut event = Event::new(TAG);
    event.add_sub_event(sub_event).unwrap();
    event.update_header().unwrap();

    let mut cursor = Cursor::new(Vec::new());
    event.write_event(&mut cursor, false).unwrap();
    read_dma_buffers(&cursor.into_inner(), false).unwrap()
}

#[test]
fn test_tracker_v0_upgrade_through_full_stack() {
    // Fixed 16-byte v0 record with TDC0=100, TDC1=200, TOT0=3, TOT1=5
    let legacy = TrackerLegacyHit {
        channel: 21,
        tdc0: 100,
        tdc1: 200,
        tot0: 3,
        tot1: 5,
        samples: [50, 60, 70, 80, 90, 100],
    };
    let mut record = [0u8; TrackerLegacyHit::SIZE];
    legacy.write_to(&mut record).unwrap();

    let mut header = DataHeaderPacket::new(0, Subsystem::Tracker, TAG, 1);
    header.format_version = 0;
    let block = DataBlock::from_payload(header, &record).unwrap();

    let event_bytes = wrap_in_event(vec![block]);
    let view = EventView::parse(&event_bytes).unwrap();
    let parsed_block = view.sub_events()[0].block(0).unwrap();

    let decoded = decode_tracker_block(parsed_block);
    assert!(!decoded.corrupted);
    assert_eq!(decoded.hits.len(), 1);

    let upgraded = &decoded.hits[0];
    assert_eq!(upgraded.tdc0(), 100);
    assert_eq!(upgraded.tdc1(), 200);
    assert_eq!(upgraded.tot0(), 3);
    assert_eq!(upgraded.tot1(), 5);
    assert_eq!(upgraded.adc_packet_count(), 1);
    // The upgraded shape is decoder-owned: the inline group fronted a
    // 12-sample packet padded with zeros
    assert_eq!(&upgraded.samples[..6], &[50, 60, 70, 80, 90, 100]);
    assert_eq!(&upgraded.samples[6..], &[0u16; 6]);
}

#[test]
fn test_crv_corruption_through_full_stack() {
    let hits = vec![
        CrvHit {
            header: CrvHitHeader {
                channel: 0x0101,
                hit_time: 10,
                sample_count: 0,
            },
            samples: vec![1, 2, 3, 4, 5, 6],
        },
        CrvHit {
            header: CrvHitHeader {
                channel: 0x0102,
                hit_time: 20,
                sample_count: 0,
            },
            samples: vec![7; 30],
        },
    ];
    let status = CrvControllerStatus {
        controller_id: 2,
        status: 0,
        event_word_count: 0,
        event_window_tag: TAG,
        active_feb_flags: 0b10,
    };
    let mut payload = encode_crv_payload(&status, &hits);

    // Understate ControllerEventWordCount so the second hit overruns it:
    // status (8 words) + first hit (6 words) + second hit header only
    let short_words = ((CrvControllerStatus::SIZE + 12 + CrvHitHeader::SIZE) / 2) as u16;
    payload[2..4].copy_from_slice(&short_words.to_le_bytes());

    let header = DataHeaderPacket::new(0, Subsystem::CosmicRayVeto, TAG, 1);
    let block = DataBlock::from_payload(header, &payload).unwrap();
    let event_bytes = wrap_in_event(vec![block]);
    let view = EventView::parse(&event_bytes).unwrap();

    let decoded = decode_crv_block(view.sub_events()[0].block(0).unwrap());
    // Corruption is reported, not fatal, and prior hits survive
    assert!(decoded.corrupted);
    assert_eq!(decoded.hits.len(), 1);
    assert_eq!(decoded.hits[0].samples, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(decoded.status.unwrap().controller_id, 2);
}

#[test]
fn test_mixed_subsystem_event_decodes_per_block() {
    let calo_payload = encode_calorimeter_payload(
        &[CaloHit {
            header: CaloHitHeader {
                board_channel: 0x0207,
                crystal_id: 99,
                time: 5000,
                sample_count: 0,
                max_sample_index: 2,
                error_flags: 0,
            },
            samples: vec![10, 600, 4000, 300],
        }],
        &CaloBoardStatus {
            board_id: 2,
            status: 0x01,
        },
    );
    let crv_payload = encode_crv_payload(
        &CrvControllerStatus {
            controller_id: 6,
            status: 0,
            event_word_count: 0,
            event_window_tag: TAG,
            active_feb_flags: 1,
        },
        &[CrvHit {
            header: CrvHitHeader {
                channel: 0x0603,
                hit_time: 77,
                sample_count: 0,
            },
            samples: vec![11, 22],
        }],
    );

    let calo_block = DataBlock::from_payload(
        DataHeaderPacket::new(0, Subsystem::Calorimeter, TAG, 1),
        &calo_payload,
    )
    .unwrap();
    let crv_block = DataBlock::from_payload(
        DataHeaderPacket::new(1, Subsystem::CosmicRayVeto, TAG, 1),
        &crv_payload,
    )
    .unwrap();

    let event_bytes = wrap_in_event(vec![calo_block, crv_block]);
    let view = EventView::parse(&event_bytes).unwrap();
    let sub_event = &view.sub_events()[0];

    let calo = decode_calorimeter_block(sub_event.block(0).unwrap());
    assert!(!calo.corrupted);
    assert_eq!(calo.hits[0].samples, vec![10, 600, 4000 & 0x0FFF, 300]);
    assert_eq!(calo.board_status.unwrap().board_id, 2);

    let crv = decode_crv_block(sub_event.block(1).unwrap());
    assert!(!crv.corrupted);
    assert_eq!(crv.hits[0].samples, vec![11, 22]);
}
