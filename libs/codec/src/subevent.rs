//! # SubEvent - All DataBlocks from One Device for One Event Window
//!
//! ## Purpose
//!
//! A SubEvent is a 24-byte header followed by an ordered list of DataBlocks.
//! The read path scans an existing buffer with a cursor and a running
//! consumed-byte total; the write path builds incrementally with sorted
//! insertion by link id.
//!
//! ## Failure policy
//!
//! SubEvent assembly is **fail-fast** ([`ChildPolicy::Propagate`]): a
//! structurally invalid child makes every later offset in the region
//! meaningless, so the error is raised to the immediate caller. The Event
//! level deliberately applies the opposite policy; see `event.rs`.

use crate::block::{DataBlock, DataBlockView};
use crate::error::{ProtocolError, ProtocolResult};
use types::protocol::message::event::SubEventHeader;

/// Named child-failure policies applied by the assembly layers
///
/// The hardware format does not force a choice; the two levels deliberately
/// differ and each names the policy it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPolicy {
    /// Raise the child's error to the caller (SubEvent level)
    Propagate,
    /// Keep validated children, log, and mark the parent truncated (Event level)
    Truncate,
}

/// Borrowed SubEvent parsed from a caller-owned buffer
#[derive(Debug, Clone)]
pub struct SubEventView<'a> {
    header: SubEventHeader,
    blocks: Vec<DataBlockView<'a>>,
    bytes: &'a [u8],
}

impl<'a> SubEventView<'a> {
    /// Policy applied to malformed children at this level
    pub const CHILD_POLICY: ChildPolicy = ChildPolicy::Propagate;

    /// Scan a SubEvent at the start of `buffer`
    ///
    /// Eager two-phase construction: the header parses first, then the body
    /// scan consumes DataBlocks until the inclusive byte count is exhausted.
    /// Each block must carry the link id matching its ordinal position and
    /// the SubEvent's own event window tag.
    pub fn parse(buffer: &'a [u8]) -> ProtocolResult<Self> {
        let header = SubEventHeader::parse(buffer)?;
        header
            .validate()
            .map_err(|e| ProtocolError::invalid_payload(e.to_string(), "SubEventHeader"))?;

        let declared = header.inclusive_byte_count as usize;
        if buffer.len() < declared {
            return Err(ProtocolError::buffer_too_small(
                declared,
                buffer.len(),
                "SubEvent region",
            ));
        }
        let bytes = &buffer[..declared];

        let mut blocks = Vec::new();
        let mut cursor = SubEventHeader::SIZE;
        while cursor < declared {
            let block = DataBlockView::parse(&bytes[cursor..])?;

            let ordinal = blocks.len() as u8;
            if block.link() != ordinal {
                return Err(ProtocolError::BlockOutOfOrder {
                    position: blocks.len(),
                    expected_link: ordinal,
                    actual_link: block.link(),
                });
            }
            if block.event_window_tag() != header.event_window_tag {
                return Err(ProtocolError::TagMismatch {
                    expected: header.event_window_tag,
                    actual: block.event_window_tag(),
                    origin: block.link(),
                });
            }

            cursor += block.byte_size();
            blocks.push(block);
        }

        Ok(Self {
            header,
            blocks,
            bytes,
        })
    }

    pub fn header(&self) -> &SubEventHeader {
        &self.header
    }

    pub fn event_window_tag(&self) -> u64 {
        self.header.event_window_tag
    }

    pub fn source_id(&self) -> u8 {
        self.header.source_id
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[DataBlockView<'a>] {
        &self.blocks
    }

    /// DataBlock at `index`, erroring past the end
    pub fn block(&self, index: usize) -> ProtocolResult<&DataBlockView<'a>> {
        self.blocks.get(index).ok_or_else(|| {
            ProtocolError::index_out_of_range(index, self.blocks.len(), "SubEvent blocks")
        })
    }

    /// Inclusive byte size consumed from the buffer
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Owned SubEvent built incrementally for the write path
#[derive(Debug, Clone)]
pub struct SubEvent {
    header: SubEventHeader,
    blocks: Vec<DataBlock>,
}

impl SubEvent {
    pub fn new(event_window_tag: u64, source_id: u8) -> Self {
        Self {
            header: SubEventHeader::new(event_window_tag, source_id),
            blocks: Vec::new(),
        }
    }

    pub fn header(&self) -> &SubEventHeader {
        &self.header
    }

    /// Mutable header access for status bytes and version stamping
    pub fn header_mut(&mut self) -> &mut SubEventHeader {
        &mut self.header
    }

    pub fn event_window_tag(&self) -> u64 {
        self.header.event_window_tag
    }

    pub fn source_id(&self) -> u8 {
        self.header.source_id
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[DataBlock] {
        &self.blocks
    }

    /// Insert a block, keeping the list sorted by link id
    ///
    /// The block must carry this SubEvent's event window tag, and each link
    /// may contribute at most one block.
    pub fn add_block(&mut self, block: DataBlock) -> ProtocolResult<()> {
        if block.event_window_tag() != self.header.event_window_tag {
            return Err(ProtocolError::TagMismatch {
                expected: self.header.event_window_tag,
                actual: block.event_window_tag(),
                origin: block.link(),
            });
        }
        if self.blocks.iter().any(|b| b.link() == block.link()) {
            return Err(ProtocolError::invalid_payload(
                format!("duplicate block for link {}", block.link()),
                "SubEvent::add_block",
            ));
        }
        let position = self
            .blocks
            .partition_point(|b| b.link() < block.link());
        self.blocks.insert(position, block);
        Ok(())
    }

    /// Recompute the inclusive byte count and block counter from children
    ///
    /// Links must form the contiguous run `0..N`; a gap would produce bytes
    /// that fail the read-path ordering validation.
    pub fn update_header(&mut self) -> ProtocolResult<()> {
        for (ordinal, block) in self.blocks.iter().enumerate() {
            if block.link() as usize != ordinal {
                return Err(ProtocolError::BlockOutOfOrder {
                    position: ordinal,
                    expected_link: ordinal as u8,
                    actual_link: block.link(),
                });
            }
        }
        let block_bytes: usize = self.blocks.iter().map(|b| b.byte_size()).sum();
        self.header.inclusive_byte_count = (SubEventHeader::SIZE + block_bytes) as u32;
        self.header.block_counter = self.blocks.len() as u8;
        Ok(())
    }

    /// Inclusive byte size this SubEvent serializes to
    pub fn byte_size(&self) -> usize {
        SubEventHeader::SIZE + self.blocks.iter().map(|b| b.byte_size()).sum::<usize>()
    }

    /// Append header and block bytes to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) -> ProtocolResult<()> {
        let mut header_bytes = [0u8; SubEventHeader::SIZE];
        self.header.write_to(&mut header_bytes)?;
        out.extend_from_slice(&header_bytes);
        for block in &self.blocks {
            out.extend_from_slice(block.bytes());
        }
        Ok(())
    }
}
