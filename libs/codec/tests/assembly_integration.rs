//! # Event Assembly Integration Tests
//!
//! End-to-end coverage of the build → serialize → reparse cycle, the
//! bounded-buffer splitting algorithm, and the two child-failure policies.

use codec::{
    dma_buffer_extents, read_dma_buffers, ChildPolicy, DataBlock, DataHeaderPacket, Event,
    EventView, ProtocolError, SubEvent, SubEventView, MAX_DMA_SIZE,
};
use std::io::Cursor;
use types::protocol::message::event::{EventHeader, SubEventHeader};
use types::Subsystem;

const TAG: u64 = 0x00AA_BBCC_DDEE;

fn block(link: u8, source: u8, payload_len: usize) -> DataBlock {
    let header = DataHeaderPacket::new(link, Subsystem::Tracker, TAG, source);
    DataBlock::from_payload(header, &vec![link ^ 0x3C; payload_len]).unwrap()
}

fn build_event(per_device_blocks: &[(u8, &[usize])]) -> Event {
    let mut event = Event::new(TAG);
    for (source, payload_lens) in per_device_blocks {
        let mut sub_event = SubEvent::new(TAG, *source);
        for (link, len) in payload_lens.iter().enumerate() {
            sub_event.add_block(block(link as u8, *source, *len)).unwrap();
        }
        event.add_sub_event(sub_event).unwrap();
    }
    event.update_header().unwrap();
    event
}

#[test]
fn test_round_trip_preserves_structure() {
    let event = build_event(&[(1, &[64, 32, 16]), (2, &[128]), (3, &[16, 16])]);

    let mut cursor = Cursor::new(Vec::new());
    event.write_event(&mut cursor, false).unwrap();
    let stream = cursor.into_inner();

    let payload = read_dma_buffers(&stream, false).unwrap();
    let view = EventView::parse(&payload).unwrap();

    assert!(!view.truncated());
    assert_eq!(view.event_window_tag(), event.event_window_tag());
    assert_eq!(view.header().num_devices, 3);
    assert_eq!(view.sub_event_count(), 3);

    let block_counts: Vec<usize> = view.sub_events().iter().map(|s| s.block_count()).collect();
    assert_eq!(block_counts, vec![3, 1, 2]);

    // Per-block content survives the trip
    let first = view.sub_events()[0].block(0).unwrap();
    assert_eq!(first.payload()[0], 0x3C);
    assert_eq!(first.event_window_tag(), TAG);
}

#[test]
fn test_round_trip_with_write_size_word() {
    let event = build_event(&[(5, &[256])]);
    let mut cursor = Cursor::new(Vec::new());
    event.write_event(&mut cursor, true).unwrap();
    let stream = cursor.into_inner();

    let outer = u64::from_le_bytes(stream[0..8].try_into().unwrap());
    let transport = u64::from_le_bytes(stream[8..16].try_into().unwrap());
    assert_eq!(transport, event.byte_size() as u64 + 16);
    assert_eq!(outer, transport + 8);

    let payload = read_dma_buffers(&stream, true).unwrap();
    let view = EventView::parse(&payload).unwrap();
    assert_eq!(view.sub_event_count(), 1);
}

#[test]
fn test_minimal_overflow_splits_into_exactly_two_buffers() {
    // Transport capacity without the write-size word is MAX_DMA_SIZE - 8.
    // Headers (24 + 24) plus blocks of 16384 and 16336 bytes total 32768
    // bytes, 8 past capacity: the smallest overflow the 16-byte block
    // granularity allows.
    let event = build_event(&[(1, &[16384 - 16, 16336 - 16])]);
    assert_eq!(event.byte_size(), MAX_DMA_SIZE);

    let mut cursor = Cursor::new(Vec::new());
    event.write_event(&mut cursor, false).unwrap();
    let stream = cursor.into_inner();

    let extents = dma_buffer_extents(&stream, false).unwrap();
    assert_eq!(extents.len(), 2, "minimal overflow must split into two buffers");
    for (offset, total) in &extents {
        assert!(total <= &MAX_DMA_SIZE, "buffer at {offset} exceeds the bound");
        // Every buffer is self-describing: transport word = payload + 16
        let word = u64::from_le_bytes(stream[*offset..offset + 8].try_into().unwrap());
        assert_eq!(word as usize, total - 8 + 16);
    }

    // First buffer carries both headers and the first block
    assert_eq!(extents[0].1, 8 + 24 + 24 + 16384);
    assert_eq!(extents[1].1, 8 + 16336);

    // And the stream still reassembles into the identical event
    let payload = read_dma_buffers(&stream, false).unwrap();
    let view = EventView::parse(&payload).unwrap();
    assert!(!view.truncated());
    assert_eq!(view.sub_events()[0].block_count(), 2);
}

#[test]
fn test_event_fitting_exactly_in_one_buffer() {
    // Total byte size just under capacity stays in a single buffer
    let event = build_event(&[(1, &[16384 - 16, 16272 - 16])]);
    assert!(event.byte_size() <= MAX_DMA_SIZE - 8);

    let mut cursor = Cursor::new(Vec::new());
    event.write_event(&mut cursor, false).unwrap();
    let stream = cursor.into_inner();
    let extents = dma_buffer_extents(&stream, false).unwrap();
    assert_eq!(extents.len(), 1);
}

#[test]
fn test_multi_buffer_split_across_many_blocks() {
    // 8 links x 8192-byte blocks = 65536 payload bytes, forcing 3 buffers
    let payloads = [8192 - 16; 8];
    let event = build_event(&[(1, &payloads)]);

    let mut cursor = Cursor::new(Vec::new());
    event.write_event(&mut cursor, true).unwrap();
    let stream = cursor.into_inner();

    let extents = dma_buffer_extents(&stream, true).unwrap();
    assert!(extents.len() >= 3);
    for (_, total) in &extents {
        assert!(total <= &MAX_DMA_SIZE);
    }

    let payload = read_dma_buffers(&stream, true).unwrap();
    let view = EventView::parse(&payload).unwrap();
    assert_eq!(view.sub_events()[0].block_count(), 8);
    for (ordinal, blk) in view.sub_events()[0].blocks().iter().enumerate() {
        assert_eq!(blk.link() as usize, ordinal);
        assert_eq!(blk.byte_size(), 8192);
    }
}

#[test]
fn test_sub_event_propagates_while_event_truncates() {
    assert_eq!(SubEventView::CHILD_POLICY, ChildPolicy::Propagate);
    assert_eq!(EventView::CHILD_POLICY, ChildPolicy::Truncate);

    let event = build_event(&[(1, &[32]), (2, &[32])]);
    let mut bytes = event.to_bytes().unwrap();

    // Corrupt the second SubEvent's block tag
    let second = EventHeader::SIZE + SubEventHeader::SIZE + 48;
    let block_tag = second + SubEventHeader::SIZE + 6;
    bytes[block_tag] ^= 0xFF;

    // SubEvent level: fail fast
    assert!(matches!(
        SubEventView::parse(&bytes[second..]),
        Err(ProtocolError::TagMismatch { .. })
    ));

    // Event level: truncate and keep the valid child
    let view = EventView::parse(&bytes).unwrap();
    assert!(view.truncated());
    assert_eq!(view.sub_event_count(), 1);
    assert_eq!(view.sub_events()[0].source_id(), 1);
}

#[test]
fn test_oversized_block_refused() {
    // A single block larger than a transport buffer cannot be split:
    // 2047 payload packets make a 32768-byte block against 32760 capacity
    let event = build_event(&[(1, &[2047 * 16])]);
    let mut cursor = Cursor::new(Vec::new());
    assert!(matches!(
        event.write_event(&mut cursor, false),
        Err(ProtocolError::OversizedBlock { .. })
    ));
}

#[test]
fn test_corrupt_transport_prefix_detected() {
    let event = build_event(&[(1, &[64])]);
    let mut cursor = Cursor::new(Vec::new());
    event.write_event(&mut cursor, true).unwrap();
    let mut stream = cursor.into_inner();

    // Make the outer write-size word disagree with the transport word
    stream[0] ^= 0x01;
    assert!(matches!(
        read_dma_buffers(&stream, true),
        Err(ProtocolError::DataCorruption { .. })
    ));
}
