//! # Driftline Codec Integration Tests
//!
//! Comprehensive integration tests for the codec crate, verifying:
//! - Public API compatibility with external crates
//! - Cross-module functionality between overlay and typed packet codecs
//! - End-to-end encode/decode round trips and error handling

use codec::{
    block_extension_packets, packet_eq, ConfigOp, ConfigPayload, ConfigRequestPacket,
    DataHeaderPacket, DataRequestPacket, HeartbeatPacket, OwnedPacket, PacketBytes, PacketView,
    ProtocolError, TypedPacket, CONTAINER_MAGIC, MAX_DMA_SIZE, PACKET_SIZE,
};
use proptest::prelude::*;
use types::{PacketType, Subsystem};

#[test]
fn test_codec_public_api_basic_functionality() {
    // Test constants
    assert_eq!(PACKET_SIZE, 16);
    assert_eq!(MAX_DMA_SIZE, 0x8000);
    assert_eq!(CONTAINER_MAGIC, 0x00BADDEED5B1BEE5);

    // Test PacketType public API
    assert_eq!(PacketType::DataHeader as u8, 5);
    assert_eq!(PacketType::try_from(1u8).unwrap(), PacketType::Heartbeat);
    assert!(PacketType::try_from(7u8).is_err());

    // Test Subsystem walk order
    assert_eq!(Subsystem::ALL[0], Subsystem::Tracker);
    assert_eq!(Subsystem::ALL[2], Subsystem::CosmicRayVeto);
}

#[test]
fn test_cross_module_functionality() {
    // Build a typed packet, view it through the overlay, decode it back
    let heartbeat = HeartbeatPacket {
        link: 2,
        event_window_tag: 0x0011_2233_4455,
        event_mode: [9, 8, 7, 6, 5],
        ring_tdc: 0x17,
    };
    let owned = heartbeat.encode().unwrap();
    let view = PacketView::new(owned.bytes()).unwrap();

    assert_eq!(view.dma_header().unwrap().packet_type, PacketType::Heartbeat);
    match TypedPacket::decode(&view).unwrap() {
        TypedPacket::Heartbeat(decoded) => assert_eq!(decoded, heartbeat),
        other => panic!("wrong variant: {other:?}"),
    }

    // TypedPacket::encode is the inverse of TypedPacket::decode
    let re_encoded = TypedPacket::Heartbeat(heartbeat).encode().unwrap();
    assert!(packet_eq(&owned, &re_encoded));
}

#[test]
fn test_equality_excludes_transport_bytes_only() {
    let request = DataRequestPacket {
        link: 1,
        event_window_tag: 500,
        debug: false,
        debug_type: 0,
        packet_count: 32,
    };
    let a = request.encode().unwrap();
    let mut b = a.clone();

    // Transport byte count differs, packets still equal
    b.as_mut_slice()[0] = 0xFF;
    b.as_mut_slice()[1] = 0x7F;
    assert!(packet_eq(&a, &b));

    // Any byte in [2, 16) breaks equality
    for index in 2..PACKET_SIZE {
        let mut c = a.clone();
        c.as_mut_slice()[index] ^= 0x01;
        assert!(!packet_eq(&a, &c), "byte {index} should participate");
    }
}

#[test]
fn test_view_mode_cannot_write() {
    // Writing is simply absent from the view type; only OwnedPacket exposes
    // write/resize. Verify the owned surface is bounds-checked.
    let mut owned = OwnedPacket::new();
    assert!(owned.write_u8(15, 1).is_ok());
    assert!(matches!(
        owned.write_u8(16, 1),
        Err(ProtocolError::BufferTooSmall { .. })
    ));
    assert!(matches!(
        owned.write_u16_le(15, 1),
        Err(ProtocolError::BufferTooSmall { .. })
    ));
}

#[test]
fn test_config_block_mode_end_to_end() {
    // 20 words: 3 in the first packet, 17 across ceil(17/8) = 3 extensions
    let words: Vec<u16> = (0..20).map(|w| 0x4000 + w).collect();
    assert_eq!(block_extension_packets(words.len()), 3);

    let request = ConfigRequestPacket {
        link: 1,
        op: ConfigOp::BlockWrite,
        request_counter: 3,
        payload: ConfigPayload::Block {
            address: 0x00A0,
            words: words.clone(),
        },
    };
    let encoded = request.encode().unwrap();
    assert_eq!(encoded.len(), PACKET_SIZE * 4);

    let view = PacketView::spanning(encoded.bytes()).unwrap();
    let decoded = ConfigRequestPacket::decode(&view).unwrap();
    assert_eq!(decoded.payload, ConfigPayload::Block {
        address: 0x00A0,
        words,
    });
}

#[test]
fn test_third_operation_refused() {
    let mut request = ConfigRequestPacket {
        link: 0,
        op: ConfigOp::Write,
        request_counter: 0,
        payload: ConfigPayload::Operations(vec![(1, 2)]),
    };
    request.add_operation(3, 4).unwrap();
    let error = request.add_operation(5, 6).unwrap_err();
    assert!(matches!(error, ProtocolError::PacketFull { count: 2, limit: 2 }));
}

#[test]
fn test_data_header_block_size_arithmetic() {
    for packet_count in [0u16, 1, 7, 2047] {
        let mut header = DataHeaderPacket::new(0, Subsystem::Tracker, 1, 1);
        header.packet_count = packet_count;
        let encoded = header.encode().unwrap();
        let decoded = DataHeaderPacket::decode(&encoded).unwrap();
        assert_eq!(decoded.block_byte_size(), 16 * (1 + packet_count as usize));
        assert_eq!(decoded.block_byte_size() % 16, 0);
        assert!(decoded.block_byte_size() >= 16);
    }
}

proptest! {
    #[test]
    fn prop_data_request_round_trip(
        link in 0u8..8,
        tag in 0u64..=0x0000_FFFF_FFFF_FFFF,
        debug in any::<bool>(),
        debug_type in any::<u8>(),
        packet_count in any::<u16>(),
    ) {
        let request = DataRequestPacket {
            link,
            event_window_tag: tag,
            debug,
            debug_type,
            packet_count,
        };
        let decoded = DataRequestPacket::decode(&request.encode().unwrap()).unwrap();
        prop_assert_eq!(decoded, request);
    }

    #[test]
    fn prop_heartbeat_round_trip(
        link in 0u8..8,
        tag in 0u64..=0x0000_FFFF_FFFF_FFFF,
        mode in any::<[u8; 5]>(),
        ring_tdc in any::<u8>(),
    ) {
        let heartbeat = HeartbeatPacket {
            link,
            event_window_tag: tag,
            event_mode: mode,
            ring_tdc,
        };
        let decoded = HeartbeatPacket::decode(&heartbeat.encode().unwrap()).unwrap();
        prop_assert_eq!(decoded, heartbeat);
    }

    #[test]
    fn prop_config_block_round_trip(
        address in any::<u16>(),
        words in proptest::collection::vec(any::<u16>(), 0..40),
    ) {
        let request = ConfigRequestPacket {
            link: 0,
            op: ConfigOp::BlockRead,
            request_counter: 1,
            payload: ConfigPayload::Block { address, words },
        };
        let encoded = request.encode().unwrap();
        let view = PacketView::spanning(encoded.bytes()).unwrap();
        let decoded = ConfigRequestPacket::decode(&view).unwrap();
        prop_assert_eq!(decoded, request);
    }
}
