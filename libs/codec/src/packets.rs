//! # Typed Packet Codecs
//!
//! ## Purpose
//!
//! Decode and encode the specific packet kinds riding on the 16-byte packet
//! overlay: configuration request/reply, heartbeat, data request, and data
//! header. Decoding any variant first checks the DMA header's type tag and
//! fails with [`ProtocolError::WrongPacketType`] on mismatch; the
//! [`TypedPacket`] enum makes the tag dispatch exhaustive and
//! compiler-checked rather than a runtime cast.
//!
//! Payload layouts (bytes 4..16 of the packet, little-endian) are normative;
//! see the per-struct docs.

use crate::error::{ProtocolError, ProtocolResult};
use crate::overlay::{OwnedPacket, PacketBytes};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use types::{DmaHeader, PacketType, Subsystem, PACKET_SIZE};

/// Data words a block-mode operation fits in the first packet
const BLOCK_WORDS_FIRST_PACKET: usize = 3;

/// Data words each 16-byte extension packet carries
const BLOCK_WORDS_PER_EXTENSION: usize = 8;

/// Maximum independent (address, value) operations per configuration packet
const MAX_CONFIG_OPS: usize = 2;

/// Configuration opcode, low nibble of byte 4
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, Serialize, Deserialize)]
pub enum ConfigOp {
    Read = 0,
    Write = 1,
    BlockRead = 2,
    BlockWrite = 3,
}

impl ConfigOp {
    pub fn is_block(&self) -> bool {
        matches!(self, ConfigOp::BlockRead | ConfigOp::BlockWrite)
    }
}

/// Payload of a configuration request or reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPayload {
    /// Up to two independent (address, value) pairs
    Operations(Vec<(u16, u16)>),
    /// A leading word count followed by that many data words
    Block { address: u16, words: Vec<u16> },
}

/// Number of 16-byte extension packets a block payload of `word_count`
/// data words requires beyond the first packet
pub fn block_extension_packets(word_count: usize) -> usize {
    word_count
        .saturating_sub(BLOCK_WORDS_FIRST_PACKET)
        .div_ceil(BLOCK_WORDS_PER_EXTENSION)
}

/// Closed union of all typed packet kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedPacket {
    ConfigRequest(ConfigRequestPacket),
    ConfigReply(ConfigReplyPacket),
    Heartbeat(HeartbeatPacket),
    DataRequest(DataRequestPacket),
    DataHeader(DataHeaderPacket),
}

impl TypedPacket {
    /// Decode any supported packet kind, dispatching on the DMA type tag
    pub fn decode(packet: &impl PacketBytes) -> ProtocolResult<Self> {
        let header = packet.dma_header()?;
        match header.packet_type {
            PacketType::ConfigRequest => {
                Ok(TypedPacket::ConfigRequest(ConfigRequestPacket::decode(packet)?))
            }
            PacketType::ConfigReply => {
                Ok(TypedPacket::ConfigReply(ConfigReplyPacket::decode(packet)?))
            }
            PacketType::Heartbeat => Ok(TypedPacket::Heartbeat(HeartbeatPacket::decode(packet)?)),
            PacketType::DataRequest => {
                Ok(TypedPacket::DataRequest(DataRequestPacket::decode(packet)?))
            }
            PacketType::DataHeader => {
                Ok(TypedPacket::DataHeader(DataHeaderPacket::decode(packet)?))
            }
            PacketType::Invalid => Err(ProtocolError::wrong_packet_type(
                PacketType::DataHeader,
                PacketType::Invalid,
                0,
            )),
        }
    }

    /// Encode the variant back into an owned packet
    pub fn encode(&self) -> ProtocolResult<OwnedPacket> {
        match self {
            TypedPacket::ConfigRequest(p) => p.encode(),
            TypedPacket::ConfigReply(p) => p.encode(),
            TypedPacket::Heartbeat(p) => p.encode(),
            TypedPacket::DataRequest(p) => p.encode(),
            TypedPacket::DataHeader(p) => p.encode(),
        }
    }
}

fn expect_type(
    packet: &impl PacketBytes,
    expected: PacketType,
) -> ProtocolResult<DmaHeader> {
    let header = packet.dma_header()?;
    if header.packet_type != expected {
        return Err(ProtocolError::wrong_packet_type(
            expected,
            header.packet_type,
            0,
        ));
    }
    Ok(header)
}

/// Heartbeat packet issued by the clock/fan-out device
///
/// ```text
/// 4-9   48-bit event window tag
/// 10-14 5-byte event mode vector
/// 15    ring timing (TDC) value
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPacket {
    pub link: u8,
    pub event_window_tag: u64,
    pub event_mode: [u8; 5],
    pub ring_tdc: u8,
}

impl HeartbeatPacket {
    pub fn decode(packet: &impl PacketBytes) -> ProtocolResult<Self> {
        let header = expect_type(packet, PacketType::Heartbeat)?;
        let bytes = packet.bytes();
        let mut event_mode = [0u8; 5];
        event_mode.copy_from_slice(&bytes[10..15]);
        Ok(Self {
            link: header.link,
            event_window_tag: packet.read_u48_le(4)?,
            event_mode,
            ring_tdc: bytes[15],
        })
    }

    pub fn encode(&self) -> ProtocolResult<OwnedPacket> {
        let mut packet = OwnedPacket::new();
        packet.write_dma_header(&DmaHeader::new(
            PacketType::Heartbeat,
            Subsystem::Tracker,
            self.link,
        ))?;
        packet.write_u48_le(4, self.event_window_tag)?;
        for (offset, byte) in self.event_mode.iter().enumerate() {
            packet.write_u8(10 + offset, *byte)?;
        }
        packet.write_u8(15, self.ring_tdc)?;
        Ok(packet)
    }
}

/// Data request packet sent toward a readout controller
///
/// ```text
/// 4-9   48-bit event window tag
/// 10    debug flag (bit 0)
/// 11    debug type
/// 12-13 requested packet count u16
/// 14-15 reserved zero
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRequestPacket {
    pub link: u8,
    pub event_window_tag: u64,
    pub debug: bool,
    pub debug_type: u8,
    pub packet_count: u16,
}

impl DataRequestPacket {
    pub fn decode(packet: &impl PacketBytes) -> ProtocolResult<Self> {
        let header = expect_type(packet, PacketType::DataRequest)?;
        Ok(Self {
            link: header.link,
            event_window_tag: packet.read_u48_le(4)?,
            debug: packet.read_u8(10)? & 0x01 != 0,
            debug_type: packet.read_u8(11)?,
            packet_count: packet.read_u16_le(12)?,
        })
    }

    pub fn encode(&self) -> ProtocolResult<OwnedPacket> {
        let mut packet = OwnedPacket::new();
        packet.write_dma_header(&DmaHeader::new(
            PacketType::DataRequest,
            Subsystem::Tracker,
            self.link,
        ))?;
        packet.write_u48_le(4, self.event_window_tag)?;
        packet.write_u8(10, self.debug as u8)?;
        packet.write_u8(11, self.debug_type)?;
        packet.write_u16_le(12, self.packet_count)?;
        Ok(packet)
    }
}

/// Data header packet opening every DataBlock
///
/// ```text
/// 4-5   data packet count (11 bits used)
/// 6-11  48-bit event window tag
/// 12    status
/// 13    data format version
/// 14    source device (DTC) id
/// 15    event-build mode
/// ```
///
/// The DMA byte count must equal `16 * (1 + packet_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeaderPacket {
    pub link: u8,
    pub subsystem_id: u8,
    pub hop_count: u8,
    pub valid: bool,
    pub packet_count: u16,
    pub event_window_tag: u64,
    pub status: u8,
    pub format_version: u8,
    pub source_id: u8,
    pub evb_mode: u8,
}

impl DataHeaderPacket {
    pub fn new(link: u8, subsystem: Subsystem, event_window_tag: u64, source_id: u8) -> Self {
        Self {
            link,
            subsystem_id: subsystem as u8,
            hop_count: 0,
            valid: true,
            packet_count: 0,
            event_window_tag,
            status: 0,
            format_version: types::FORMAT_VERSION,
            source_id,
            evb_mode: 0,
        }
    }

    pub fn decode(packet: &impl PacketBytes) -> ProtocolResult<Self> {
        let header = expect_type(packet, PacketType::DataHeader)?;
        let packet_count = packet.read_u16_le(4)? & 0x07FF;
        let expected = PACKET_SIZE * (1 + packet_count as usize);
        if header.byte_count as usize != expected {
            return Err(ProtocolError::wrong_packet_size(
                header.byte_count as usize,
                packet_count as usize,
                "DataHeader byte count",
            ));
        }
        Ok(Self {
            link: header.link,
            subsystem_id: header.subsystem_id,
            hop_count: header.hop_count,
            valid: header.valid,
            packet_count,
            event_window_tag: packet.read_u48_le(6)?,
            status: packet.read_u8(12)?,
            format_version: packet.read_u8(13)?,
            source_id: packet.read_u8(14)?,
            evb_mode: packet.read_u8(15)?,
        })
    }

    pub fn encode(&self) -> ProtocolResult<OwnedPacket> {
        if self.packet_count > 0x07FF {
            return Err(ProtocolError::Field(types::ProtocolError::FieldOutOfRange {
                field: "packet_count",
                value: self.packet_count as u64,
                max: 0x07FF,
            }));
        }
        let mut packet = OwnedPacket::new();
        let header = DmaHeader {
            byte_count: (PACKET_SIZE * (1 + self.packet_count as usize)) as u16,
            valid: self.valid,
            packet_type: PacketType::DataHeader,
            link: self.link,
            subsystem_id: self.subsystem_id,
            hop_count: self.hop_count,
        };
        packet.write_dma_header(&header)?;
        packet.write_u16_le(4, self.packet_count)?;
        packet.write_u48_le(6, self.event_window_tag)?;
        packet.write_u8(12, self.status)?;
        packet.write_u8(13, self.format_version)?;
        packet.write_u8(14, self.source_id)?;
        packet.write_u8(15, self.evb_mode)?;
        Ok(packet)
    }

    /// Subsystem the enclosing DataBlock belongs to
    pub fn subsystem(&self) -> ProtocolResult<Subsystem> {
        Ok(Subsystem::try_from(self.subsystem_id)?)
    }

    /// Total DataBlock size declared by this header
    pub fn block_byte_size(&self) -> usize {
        PACKET_SIZE * (1 + self.packet_count as usize)
    }
}

/// Configuration request (DCS) packet
///
/// ```text
/// 4     [3:0] opcode  [7] double-operation flag
/// 5     request counter
/// paired mode: 6-7 addr1, 8-9 val1, 10-11 addr2, 12-13 val2
/// block mode:  6-7 address, 8-9 word count, data words from byte 10,
///              3 words in the first packet then 8 per 16-byte extension
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRequestPacket {
    pub link: u8,
    pub op: ConfigOp,
    pub request_counter: u8,
    pub payload: ConfigPayload,
}

/// Configuration reply (DCS) packet; same layout as the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigReplyPacket {
    pub link: u8,
    pub op: ConfigOp,
    pub request_counter: u8,
    pub payload: ConfigPayload,
}

fn decode_config(
    packet: &impl PacketBytes,
    expected: PacketType,
) -> ProtocolResult<(u8, ConfigOp, u8, ConfigPayload)> {
    let header = expect_type(packet, expected)?;
    let bytes = packet.bytes();
    let opcode = bytes[4] & 0x0F;
    let op = ConfigOp::try_from_primitive(opcode)
        .map_err(|_| ProtocolError::Field(types::ProtocolError::FieldOutOfRange {
            field: "config_opcode",
            value: opcode as u64,
            max: ConfigOp::BlockWrite as u64,
        }))?;
    let request_counter = bytes[5];

    let payload = if op.is_block() {
        let address = packet.read_u16_le(6)?;
        let word_count = packet.read_u16_le(8)? as usize;
        let extensions = block_extension_packets(word_count);
        let declared = PACKET_SIZE * (1 + extensions);
        if header.byte_count as usize != declared {
            return Err(ProtocolError::wrong_packet_size(
                header.byte_count as usize,
                extensions,
                "block-mode config byte count",
            ));
        }
        if bytes.len() < declared {
            return Err(ProtocolError::buffer_too_small(
                declared,
                bytes.len(),
                "block-mode config extensions",
            ));
        }
        let mut words = Vec::with_capacity(word_count);
        for index in 0..word_count {
            let offset = if index < BLOCK_WORDS_FIRST_PACKET {
                10 + index * 2
            } else {
                let beyond = index - BLOCK_WORDS_FIRST_PACKET;
                let extension = beyond / BLOCK_WORDS_PER_EXTENSION;
                let slot = beyond % BLOCK_WORDS_PER_EXTENSION;
                PACKET_SIZE * (1 + extension) + slot * 2
            };
            words.push(packet.read_u16_le(offset)?);
        }
        ConfigPayload::Block { address, words }
    } else {
        let double = bytes[4] & 0x80 != 0;
        let mut ops = vec![(packet.read_u16_le(6)?, packet.read_u16_le(8)?)];
        if double {
            ops.push((packet.read_u16_le(10)?, packet.read_u16_le(12)?));
        }
        ConfigPayload::Operations(ops)
    };

    Ok((header.link, op, request_counter, payload))
}

fn encode_config(
    packet_type: PacketType,
    link: u8,
    op: ConfigOp,
    request_counter: u8,
    payload: &ConfigPayload,
) -> ProtocolResult<OwnedPacket> {
    let mut packet = OwnedPacket::new();
    let mut header = DmaHeader::new(packet_type, Subsystem::Tracker, link);

    match payload {
        ConfigPayload::Operations(ops) => {
            if op.is_block() {
                return Err(ProtocolError::invalid_payload(
                    "block opcode with paired payload",
                    "config encode",
                ));
            }
            if ops.is_empty() {
                return Err(ProtocolError::invalid_payload(
                    "config packet with no operations",
                    "config encode",
                ));
            }
            if ops.len() > MAX_CONFIG_OPS {
                return Err(ProtocolError::PacketFull {
                    count: ops.len(),
                    limit: MAX_CONFIG_OPS,
                });
            }
            packet.write_dma_header(&header)?;
            packet.write_u8(4, (op as u8) | if ops.len() == 2 { 0x80 } else { 0 })?;
            packet.write_u8(5, request_counter)?;
            for (slot, (address, value)) in ops.iter().enumerate() {
                packet.write_u16_le(6 + slot * 4, *address)?;
                packet.write_u16_le(8 + slot * 4, *value)?;
            }
        }
        ConfigPayload::Block { address, words } => {
            if !op.is_block() {
                return Err(ProtocolError::invalid_payload(
                    "paired opcode with block payload",
                    "config encode",
                ));
            }
            // The extension count must be known before the DMA header is
            // written: the byte count field covers every extension packet.
            let extensions = block_extension_packets(words.len());
            let total = PACKET_SIZE * (1 + extensions);
            if total > u16::MAX as usize {
                return Err(ProtocolError::Field(types::ProtocolError::FieldOutOfRange {
                    field: "block_word_count",
                    value: words.len() as u64,
                    max: BLOCK_WORDS_FIRST_PACKET as u64
                        + (u16::MAX as u64 / PACKET_SIZE as u64 - 1)
                            * BLOCK_WORDS_PER_EXTENSION as u64,
                }));
            }
            header.byte_count = total as u16;
            if total > PACKET_SIZE {
                packet.resize(total)?;
            }
            packet.write_dma_header(&header)?;
            packet.write_u8(4, op as u8)?;
            packet.write_u8(5, request_counter)?;
            packet.write_u16_le(6, *address)?;
            packet.write_u16_le(8, words.len() as u16)?;
            for (index, word) in words.iter().enumerate() {
                let offset = if index < BLOCK_WORDS_FIRST_PACKET {
                    10 + index * 2
                } else {
                    let beyond = index - BLOCK_WORDS_FIRST_PACKET;
                    let extension = beyond / BLOCK_WORDS_PER_EXTENSION;
                    let slot = beyond % BLOCK_WORDS_PER_EXTENSION;
                    PACKET_SIZE * (1 + extension) + slot * 2
                };
                packet.write_u16_le(offset, *word)?;
            }
        }
    }
    Ok(packet)
}

impl ConfigRequestPacket {
    /// Single-operation read request
    pub fn read(link: u8, address: u16) -> Self {
        Self {
            link,
            op: ConfigOp::Read,
            request_counter: 0,
            payload: ConfigPayload::Operations(vec![(address, 0)]),
        }
    }

    /// Append a second independent operation
    ///
    /// A packet holds at most two; a third is refused.
    pub fn add_operation(&mut self, address: u16, value: u16) -> ProtocolResult<()> {
        match &mut self.payload {
            ConfigPayload::Operations(ops) => {
                if ops.len() >= MAX_CONFIG_OPS {
                    return Err(ProtocolError::PacketFull {
                        count: ops.len(),
                        limit: MAX_CONFIG_OPS,
                    });
                }
                ops.push((address, value));
                Ok(())
            }
            ConfigPayload::Block { .. } => Err(ProtocolError::invalid_payload(
                "cannot add paired operation to block-mode packet",
                "ConfigRequestPacket::add_operation",
            )),
        }
    }

    pub fn decode(packet: &impl PacketBytes) -> ProtocolResult<Self> {
        let (link, op, request_counter, payload) =
            decode_config(packet, PacketType::ConfigRequest)?;
        Ok(Self {
            link,
            op,
            request_counter,
            payload,
        })
    }

    pub fn encode(&self) -> ProtocolResult<OwnedPacket> {
        encode_config(
            PacketType::ConfigRequest,
            self.link,
            self.op,
            self.request_counter,
            &self.payload,
        )
    }
}

impl ConfigReplyPacket {
    pub fn decode(packet: &impl PacketBytes) -> ProtocolResult<Self> {
        let (link, op, request_counter, payload) = decode_config(packet, PacketType::ConfigReply)?;
        Ok(Self {
            link,
            op,
            request_counter,
            payload,
        })
    }

    pub fn encode(&self) -> ProtocolResult<OwnedPacket> {
        encode_config(
            PacketType::ConfigReply,
            self.link,
            self.op,
            self.request_counter,
            &self.payload,
        )
    }
}
