//! # DataBlock - One Readout Controller's Data for One Event Window
//!
//! A DataBlock is a DataHeader packet plus its declared run of payload
//! bytes. The block's size is read from the header's DMA byte count, so a
//! block cannot be constructed before at least 16 bytes are readable at its
//! start. [`DataBlockView`] borrows caller-owned memory for the read path;
//! [`DataBlock`] owns its bytes outright for the build path. There is no
//! shared-ownership middle ground.

use crate::error::{ProtocolError, ProtocolResult};
use crate::overlay::{PacketBytes, PacketView};
use crate::packets::DataHeaderPacket;
use types::{Subsystem, PACKET_SIZE};

/// Borrowed DataBlock over a caller-owned buffer region
#[derive(Debug, Clone, Copy)]
pub struct DataBlockView<'a> {
    header: DataHeaderPacket,
    bytes: &'a [u8],
}

impl<'a> DataBlockView<'a> {
    /// Construct a block at the start of `buffer`
    ///
    /// Reads the header packet, validates the declared size against the
    /// packet count, and requires `buffer` to cover the whole block.
    pub fn parse(buffer: &'a [u8]) -> ProtocolResult<Self> {
        let packet = PacketView::new(buffer)?;
        let header = DataHeaderPacket::decode(&packet)?;
        let byte_size = header.block_byte_size();
        if buffer.len() < byte_size {
            return Err(ProtocolError::buffer_too_small(
                byte_size,
                buffer.len(),
                "DataBlock payload",
            ));
        }
        Ok(Self {
            header,
            bytes: &buffer[..byte_size],
        })
    }

    /// Decoded header packet
    pub fn header(&self) -> &DataHeaderPacket {
        &self.header
    }

    /// Declared block size; always a positive multiple of 16
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    /// Event window tag stamped in the header
    pub fn event_window_tag(&self) -> u64 {
        self.header.event_window_tag
    }

    /// Hardware link this block arrived on
    pub fn link(&self) -> u8 {
        self.header.link
    }

    /// Raw subsystem id from the header
    pub fn subsystem_id(&self) -> u8 {
        self.header.subsystem_id
    }

    /// Typed subsystem, failing on out-of-enumeration ids
    pub fn subsystem(&self) -> ProtocolResult<Subsystem> {
        self.header.subsystem()
    }

    /// The full block region, header packet included
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Payload bytes spanning `[16, byte_size)`
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[PACKET_SIZE..]
    }

    /// Materialize into independently-owned storage
    pub fn to_block(&self) -> DataBlock {
        DataBlock {
            header: self.header,
            bytes: self.bytes.to_vec(),
        }
    }
}

/// Owned DataBlock for the build path
#[derive(Debug, Clone)]
pub struct DataBlock {
    header: DataHeaderPacket,
    bytes: Vec<u8>,
}

impl DataBlock {
    /// Frame `payload` behind a DataHeader packet
    ///
    /// The payload is zero-padded to a 16-byte packet boundary and the
    /// header's packet count is derived from the padded length.
    pub fn from_payload(
        mut header: DataHeaderPacket,
        payload: &[u8],
    ) -> ProtocolResult<Self> {
        let padded = payload.len().div_ceil(PACKET_SIZE) * PACKET_SIZE;
        let packet_count = padded / PACKET_SIZE;
        if packet_count > 0x07FF {
            return Err(ProtocolError::wrong_packet_size(
                PACKET_SIZE + padded,
                packet_count,
                "DataBlock::from_payload",
            ));
        }
        header.packet_count = packet_count as u16;

        let encoded = header.encode()?;
        let mut bytes = Vec::with_capacity(PACKET_SIZE + padded);
        bytes.extend_from_slice(encoded.bytes());
        bytes.extend_from_slice(payload);
        bytes.resize(PACKET_SIZE + padded, 0);
        Ok(Self { header, bytes })
    }

    pub fn header(&self) -> &DataHeaderPacket {
        &self.header
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn event_window_tag(&self) -> u64 {
        self.header.event_window_tag
    }

    pub fn link(&self) -> u8 {
        self.header.link
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow as a read-path view
    pub fn view(&self) -> DataBlockView<'_> {
        DataBlockView {
            header: self.header,
            bytes: &self.bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_header(link: u8, tag: u64) -> DataHeaderPacket {
        DataHeaderPacket::new(link, Subsystem::Tracker, tag, 1)
    }

    #[test]
    fn test_block_from_payload_pads_to_packet_boundary() {
        let block = DataBlock::from_payload(tracker_header(0, 5), &[0xAA; 20]).unwrap();
        assert_eq!(block.byte_size(), 48); // header + 2 payload packets
        assert_eq!(block.header().packet_count, 2);
        assert_eq!(block.byte_size() % 16, 0);

        let view = block.view();
        assert_eq!(&view.payload()[..20], &[0xAA; 20]);
        assert_eq!(&view.payload()[20..], &[0u8; 12]);
    }

    #[test]
    fn test_view_round_trip() {
        let block = DataBlock::from_payload(tracker_header(3, 77), &[1, 2, 3, 4]).unwrap();
        let view = DataBlockView::parse(block.bytes()).unwrap();
        assert_eq!(view.byte_size(), 32);
        assert_eq!(view.link(), 3);
        assert_eq!(view.event_window_tag(), 77);
        assert_eq!(view.subsystem().unwrap(), Subsystem::Tracker);
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let block = DataBlock::from_payload(tracker_header(0, 1), &[0; 64]).unwrap();
        let truncated = &block.bytes()[..block.byte_size() - 16];
        assert!(matches!(
            DataBlockView::parse(truncated),
            Err(ProtocolError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_empty_payload_is_bare_header() {
        let block = DataBlock::from_payload(tracker_header(0, 1), &[]).unwrap();
        assert_eq!(block.byte_size(), 16);
        assert!(block.view().payload().is_empty());
    }
}
