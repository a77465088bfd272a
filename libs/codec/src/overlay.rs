//! # Packet Overlay - Borrowed and Owned 16-Byte Packet Access
//!
//! ## Purpose
//!
//! Interprets a fixed-size 16-byte region of a byte buffer as a
//! header-plus-payload unit. Two capability-tagged forms share one read
//! interface: [`PacketView`] borrows caller-owned memory and can never write,
//! while [`OwnedPacket`] holds its own growable backing store and is the only
//! type exposing write and resize operations. The split is static - there is
//! no runtime "is this writable" flag to get wrong.
//!
//! All field access is bounds-checked slice arithmetic; a packet is never
//! produced by reinterpreting a byte region as a language-level record.

use crate::error::{ProtocolError, ProtocolResult};
use types::{DmaHeader, PACKET_SIZE};

/// Common read surface over borrowed and owned packets
pub trait PacketBytes {
    /// The full packet region (at least 16 bytes)
    fn bytes(&self) -> &[u8];

    /// Single byte at `index`
    fn read_u8(&self, index: usize) -> ProtocolResult<u8> {
        self.bytes()
            .get(index)
            .copied()
            .ok_or_else(|| ProtocolError::buffer_too_small(index + 1, self.bytes().len(), "read_u8"))
    }

    /// Little-endian u16 at `index`
    fn read_u16_le(&self, index: usize) -> ProtocolResult<u16> {
        let bytes = self.bytes();
        bytes
            .get(index..index + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .ok_or_else(|| ProtocolError::buffer_too_small(index + 2, bytes.len(), "read_u16_le"))
    }

    /// Little-endian u32 at `index`
    fn read_u32_le(&self, index: usize) -> ProtocolResult<u32> {
        let bytes = self.bytes();
        bytes
            .get(index..index + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| ProtocolError::buffer_too_small(index + 4, bytes.len(), "read_u32_le"))
    }

    /// Little-endian 48-bit value at `index`
    fn read_u48_le(&self, index: usize) -> ProtocolResult<u64> {
        let bytes = self.bytes();
        bytes
            .get(index..index + 6)
            .map(|b| {
                let mut word = [0u8; 8];
                word[..6].copy_from_slice(b);
                u64::from_le_bytes(word)
            })
            .ok_or_else(|| ProtocolError::buffer_too_small(index + 6, bytes.len(), "read_u48_le"))
    }

    /// Decode the DMA header prefix
    fn dma_header(&self) -> ProtocolResult<DmaHeader> {
        Ok(DmaHeader::parse(self.bytes())?)
    }
}

/// Compare two packets, ignoring the transport byte-count word
///
/// The first two bytes legitimately differ between otherwise-identical
/// packets, so equality covers bytes `[2, 16)` only.
pub fn packet_eq(a: &impl PacketBytes, b: &impl PacketBytes) -> bool {
    a.bytes()[2..PACKET_SIZE] == b.bytes()[2..PACKET_SIZE]
}

/// Read-only overlay over caller-owned packet bytes
///
/// The view borrows the underlying buffer for its lifetime; growth of the
/// buffer it came from is impossible while the view exists, so the
/// dangling-after-resize hazard cannot occur.
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    bytes: &'a [u8],
}

impl<'a> PacketView<'a> {
    /// View the leading 16 bytes of `buffer`
    pub fn new(buffer: &'a [u8]) -> ProtocolResult<Self> {
        if buffer.len() < PACKET_SIZE {
            return Err(ProtocolError::buffer_too_small(
                PACKET_SIZE,
                buffer.len(),
                "PacketView::new",
            ));
        }
        Ok(Self {
            bytes: &buffer[..PACKET_SIZE],
        })
    }

    /// View the whole block declared by the DMA header byte count
    ///
    /// Used for packets carrying 16-byte extensions (block-mode configuration
    /// operations). Fails if `buffer` is shorter than the declared count.
    pub fn spanning(buffer: &'a [u8]) -> ProtocolResult<Self> {
        if buffer.len() < PACKET_SIZE {
            return Err(ProtocolError::buffer_too_small(
                PACKET_SIZE,
                buffer.len(),
                "PacketView::spanning",
            ));
        }
        let header = DmaHeader::parse(buffer)?;
        let span = header.byte_count as usize;
        if buffer.len() < span {
            return Err(ProtocolError::buffer_too_small(
                span,
                buffer.len(),
                "PacketView::spanning declared block",
            ));
        }
        Ok(Self {
            bytes: &buffer[..span],
        })
    }
}

impl PacketBytes for PacketView<'_> {
    fn bytes(&self) -> &[u8] {
        self.bytes
    }
}

/// Packet with its own growable backing store
///
/// The store starts at one packet and only ever grows; every grow operation
/// goes through [`OwnedPacket::resize`], the sole growth path.
#[derive(Debug, Clone)]
pub struct OwnedPacket {
    bytes: Vec<u8>,
}

impl Default for OwnedPacket {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnedPacket {
    /// A zeroed single packet
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; PACKET_SIZE],
        }
    }

    /// Copy an existing region into owned storage
    pub fn from_bytes(buffer: &[u8]) -> ProtocolResult<Self> {
        if buffer.len() < PACKET_SIZE {
            return Err(ProtocolError::buffer_too_small(
                PACKET_SIZE,
                buffer.len(),
                "OwnedPacket::from_bytes",
            ));
        }
        Ok(Self {
            bytes: buffer.to_vec(),
        })
    }

    /// Current backing-store size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Grow the backing store to `new_size` bytes (zero filled)
    ///
    /// This is the sole growth path: `new_size` must exceed the current size
    /// and be a multiple of the packet size.
    pub fn resize(&mut self, new_size: usize) -> ProtocolResult<()> {
        if new_size <= self.bytes.len() {
            return Err(ProtocolError::InvalidResize {
                requested: new_size,
                current: self.bytes.len(),
            });
        }
        if new_size % PACKET_SIZE != 0 {
            return Err(ProtocolError::Field(types::ProtocolError::InvalidByteCount(
                new_size as u16,
            )));
        }
        self.bytes.resize(new_size, 0);
        Ok(())
    }

    /// Write a single byte at `index`
    pub fn write_u8(&mut self, index: usize, value: u8) -> ProtocolResult<()> {
        let len = self.bytes.len();
        match self.bytes.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ProtocolError::buffer_too_small(index + 1, len, "write_u8")),
        }
    }

    /// Write a little-endian u16 at `index`
    pub fn write_u16_le(&mut self, index: usize, value: u16) -> ProtocolResult<()> {
        let len = self.bytes.len();
        match self.bytes.get_mut(index..index + 2) {
            Some(slot) => {
                slot.copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
            None => Err(ProtocolError::buffer_too_small(index + 2, len, "write_u16_le")),
        }
    }

    /// Write a little-endian 48-bit value at `index`
    pub fn write_u48_le(&mut self, index: usize, value: u64) -> ProtocolResult<()> {
        let len = self.bytes.len();
        match self.bytes.get_mut(index..index + 6) {
            Some(slot) => {
                slot.copy_from_slice(&value.to_le_bytes()[..6]);
                Ok(())
            }
            None => Err(ProtocolError::buffer_too_small(index + 6, len, "write_u48_le")),
        }
    }

    /// Encode a DMA header into the packet prefix
    pub fn write_dma_header(&mut self, header: &DmaHeader) -> ProtocolResult<()> {
        Ok(header.write_to(&mut self.bytes)?)
    }

    /// Mutable access to the backing store
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Borrow the packet as a view
    pub fn view(&self) -> PacketView<'_> {
        PacketView { bytes: &self.bytes }
    }
}

impl PacketBytes for OwnedPacket {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
