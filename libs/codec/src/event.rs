//! # Event - All SubEvents from All Devices for One Event Window
//!
//! ## Purpose
//!
//! The top of the assembly hierarchy: a 24-byte header followed by an ordered
//! list of SubEvents, grouped implicitly by originating device. The read path
//! applies the **truncate** policy ([`ChildPolicy::Truncate`]): a malformed
//! child stops assembly, is logged, and the Event is returned with the
//! children already validated. Serialization splits the Event across
//! bounded-size transport buffers, each self-describing via leading size
//! words.
//!
//! ## Transport framing
//!
//! Every buffer begins with a 64-bit little-endian transport size word whose
//! value is the buffer's payload bytes plus 16; with
//! `include_write_size` an enclosing write-size word (transport + 8) precedes
//! it. Payload plus size words never exceed [`MAX_DMA_SIZE`].

use crate::error::{ProtocolError, ProtocolResult};
use crate::subevent::{ChildPolicy, SubEvent, SubEventView};
use std::collections::BTreeSet;
use std::io::{Seek, SeekFrom, Write};
use tracing::{debug, warn};
use types::protocol::message::event::{EventHeader, SubEventHeader};
use types::MAX_DMA_SIZE;

/// Bytes the transport size word adds to the payload count
const TRANSPORT_SIZE_BIAS: u64 = 16;

/// Bytes the enclosing write-size word adds to the transport word
const WRITE_SIZE_BIAS: u64 = 8;

fn prefix_len(include_write_size: bool) -> usize {
    if include_write_size {
        16
    } else {
        8
    }
}

/// Borrowed Event parsed from a caller-owned buffer
#[derive(Debug, Clone)]
pub struct EventView<'a> {
    header: EventHeader,
    sub_events: Vec<SubEventView<'a>>,
    truncated: bool,
}

impl<'a> EventView<'a> {
    /// Policy applied to malformed children at this level
    pub const CHILD_POLICY: ChildPolicy = ChildPolicy::Truncate;

    /// Scan an Event at the start of `buffer`
    ///
    /// The header must parse; a malformed SubEvent truncates the Event
    /// instead of failing the decode. Every recovery is logged.
    pub fn parse(buffer: &'a [u8]) -> ProtocolResult<Self> {
        let header = EventHeader::parse(buffer)?;
        header
            .validate()
            .map_err(|e| ProtocolError::invalid_payload(e.to_string(), "EventHeader"))?;

        let declared = header.inclusive_byte_count as usize;
        let mut truncated = false;
        if buffer.len() < declared {
            warn!(
                declared,
                available = buffer.len(),
                "event buffer shorter than declared size, assembling what is present"
            );
            truncated = true;
        }
        let bytes = &buffer[..declared.min(buffer.len())];

        let mut sub_events = Vec::new();
        let mut cursor = EventHeader::SIZE;
        while cursor < declared {
            match SubEventView::parse(&bytes[cursor.min(bytes.len())..]) {
                Ok(sub_event) => {
                    cursor += sub_event.byte_size();
                    sub_events.push(sub_event);
                }
                Err(error) => {
                    warn!(
                        %error,
                        consumed = cursor,
                        declared,
                        assembled = sub_events.len(),
                        "event assembly truncated by malformed sub-event"
                    );
                    truncated = true;
                    break;
                }
            }
        }

        debug!(
            event_window_tag = header.event_window_tag,
            sub_events = sub_events.len(),
            truncated,
            "event assembled"
        );

        Ok(Self {
            header,
            sub_events,
            truncated,
        })
    }

    pub fn header(&self) -> &EventHeader {
        &self.header
    }

    pub fn event_window_tag(&self) -> u64 {
        self.header.event_window_tag
    }

    pub fn sub_event_count(&self) -> usize {
        self.sub_events.len()
    }

    pub fn sub_events(&self) -> &[SubEventView<'a>] {
        &self.sub_events
    }

    /// SubEvent at `index`, erroring past the end
    pub fn sub_event(&self, index: usize) -> ProtocolResult<&SubEventView<'a>> {
        self.sub_events.get(index).ok_or_else(|| {
            ProtocolError::index_out_of_range(index, self.sub_events.len(), "Event sub-events")
        })
    }

    /// True when assembly stopped before the declared byte count
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Owned Event built incrementally for the write path
#[derive(Debug, Clone)]
pub struct Event {
    header: EventHeader,
    sub_events: Vec<SubEvent>,
}

impl Event {
    pub fn new(event_window_tag: u64) -> Self {
        Self {
            header: EventHeader::new(event_window_tag),
            sub_events: Vec::new(),
        }
    }

    pub fn header(&self) -> &EventHeader {
        &self.header
    }

    /// Mutable header access for mode and status stamping
    pub fn header_mut(&mut self) -> &mut EventHeader {
        &mut self.header
    }

    pub fn event_window_tag(&self) -> u64 {
        self.header.event_window_tag
    }

    pub fn sub_event_count(&self) -> usize {
        self.sub_events.len()
    }

    pub fn sub_events(&self) -> &[SubEvent] {
        &self.sub_events
    }

    /// Append a SubEvent; it must carry this Event's window tag
    pub fn add_sub_event(&mut self, sub_event: SubEvent) -> ProtocolResult<()> {
        if sub_event.event_window_tag() != self.header.event_window_tag {
            return Err(ProtocolError::TagMismatch {
                expected: self.header.event_window_tag,
                actual: sub_event.event_window_tag(),
                origin: sub_event.source_id(),
            });
        }
        self.sub_events.push(sub_event);
        Ok(())
    }

    /// Recompute aggregate byte counts bottom-up from current children
    ///
    /// Each SubEvent's inclusive count is refreshed first, then the Event's
    /// own count and device tally. Must be called before [`Self::write_event`].
    pub fn update_header(&mut self) -> ProtocolResult<()> {
        let mut total = EventHeader::SIZE;
        let mut devices = BTreeSet::new();
        for sub_event in &mut self.sub_events {
            sub_event.update_header()?;
            total += sub_event.byte_size();
            devices.insert(sub_event.source_id());
        }
        self.header.inclusive_byte_count = total as u32;
        self.header.num_devices = devices.len() as u8;
        Ok(())
    }

    /// Inclusive byte size this Event serializes to (excluding transport framing)
    pub fn byte_size(&self) -> usize {
        EventHeader::SIZE + self.sub_events.iter().map(|s| s.byte_size()).sum::<usize>()
    }

    /// Contiguous Event bytes without transport framing
    pub fn to_bytes(&self) -> ProtocolResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.byte_size());
        let mut header_bytes = [0u8; EventHeader::SIZE];
        self.header.write_to(&mut header_bytes)?;
        out.extend_from_slice(&header_bytes);
        for sub_event in &self.sub_events {
            sub_event.write_to(&mut out)?;
        }
        Ok(out)
    }

    /// Serialize across one or more bounded transport buffers
    ///
    /// Call [`Self::update_header`] first. If the whole Event fits under
    /// [`MAX_DMA_SIZE`] it is written in one pass behind a single prefix.
    /// Otherwise serialization proceeds buffer by buffer: before a child that
    /// would cross the bound, the current buffer's prefix is back-patched
    /// with the actual payload written and a new buffer begins with an
    /// anticipated-size prefix for the remainder. Returns the total bytes
    /// written including framing.
    pub fn write_event<W: Write + Seek>(
        &self,
        out: &mut W,
        include_write_size: bool,
    ) -> ProtocolResult<u64> {
        let prefix = prefix_len(include_write_size);
        let capacity = MAX_DMA_SIZE - prefix;

        // Chunks are the indivisible units a buffer boundary may fall
        // between: the Event header, each SubEvent header, each DataBlock.
        let mut header_chunks: Vec<[u8; SubEventHeader::SIZE]> = Vec::new();
        let mut event_header = [0u8; EventHeader::SIZE];
        self.header.write_to(&mut event_header)?;
        header_chunks.push(event_header);
        for sub_event in &self.sub_events {
            let mut bytes = [0u8; SubEventHeader::SIZE];
            sub_event.header().write_to(&mut bytes)?;
            header_chunks.push(bytes);
        }

        let mut chunks: Vec<&[u8]> = Vec::new();
        chunks.push(&header_chunks[0]);
        for (index, sub_event) in self.sub_events.iter().enumerate() {
            chunks.push(&header_chunks[index + 1]);
            for block in sub_event.blocks() {
                chunks.push(block.bytes());
            }
        }

        for chunk in &chunks {
            if chunk.len() > capacity {
                return Err(ProtocolError::oversized_block(chunk.len(), capacity));
            }
        }

        let start = out.stream_position()?;
        let mut remaining: usize = chunks.iter().map(|c| c.len()).sum();
        let mut buffer_start = start;
        let mut in_buffer = 0usize;
        write_prefix(out, remaining.min(capacity), include_write_size)?;

        for chunk in &chunks {
            if in_buffer + chunk.len() > capacity {
                patch_prefix(out, buffer_start, in_buffer, include_write_size)?;
                buffer_start = out.stream_position()?;
                write_prefix(out, remaining.min(capacity), include_write_size)?;
                in_buffer = 0;
            }
            out.write_all(chunk)?;
            in_buffer += chunk.len();
            remaining -= chunk.len();
        }
        patch_prefix(out, buffer_start, in_buffer, include_write_size)?;

        Ok(out.stream_position()? - start)
    }
}

fn write_prefix<W: Write>(
    out: &mut W,
    payload: usize,
    include_write_size: bool,
) -> ProtocolResult<()> {
    let transport = payload as u64 + TRANSPORT_SIZE_BIAS;
    if include_write_size {
        out.write_all(&(transport + WRITE_SIZE_BIAS).to_le_bytes())?;
    }
    out.write_all(&transport.to_le_bytes())?;
    Ok(())
}

fn patch_prefix<W: Write + Seek>(
    out: &mut W,
    buffer_start: u64,
    payload: usize,
    include_write_size: bool,
) -> ProtocolResult<()> {
    let end = out.stream_position()?;
    out.seek(SeekFrom::Start(buffer_start))?;
    write_prefix(out, payload, include_write_size)?;
    out.seek(SeekFrom::Start(end))?;
    Ok(())
}

/// Re-assemble the contiguous Event byte stream from prefixed transport buffers
///
/// The counterpart of [`Event::write_event`]: strips the size word(s) from
/// each buffer and concatenates the payloads so the result can be handed to
/// [`EventView::parse`].
pub fn read_dma_buffers(bytes: &[u8], include_write_size: bool) -> ProtocolResult<Vec<u8>> {
    let prefix = prefix_len(include_write_size);
    let mut payload = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        if bytes.len() - offset < prefix {
            return Err(ProtocolError::buffer_too_small(
                offset + prefix,
                bytes.len(),
                "transport buffer prefix",
            ));
        }
        let mut cursor = offset;
        let outer = if include_write_size {
            let word = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
            cursor += 8;
            Some(word)
        } else {
            None
        };
        let transport = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
        cursor += 8;

        if transport < TRANSPORT_SIZE_BIAS {
            return Err(ProtocolError::data_corruption(
                offset,
                transport as usize,
                0,
                "transport size word below minimum",
            ));
        }
        if let Some(outer) = outer {
            if outer != transport + WRITE_SIZE_BIAS {
                return Err(ProtocolError::data_corruption(
                    offset,
                    (transport + WRITE_SIZE_BIAS) as usize,
                    outer as usize,
                    "write-size word disagrees with transport size word",
                ));
            }
        }

        let buffer_payload = (transport - TRANSPORT_SIZE_BIAS) as usize;
        if prefix + buffer_payload > MAX_DMA_SIZE {
            return Err(ProtocolError::data_corruption(
                offset,
                MAX_DMA_SIZE,
                prefix + buffer_payload,
                "transport buffer exceeds DMA bound",
            ));
        }
        if bytes.len() < cursor + buffer_payload {
            return Err(ProtocolError::buffer_too_small(
                cursor + buffer_payload,
                bytes.len(),
                "transport buffer payload",
            ));
        }

        payload.extend_from_slice(&bytes[cursor..cursor + buffer_payload]);
        offset = cursor + buffer_payload;
    }

    Ok(payload)
}

/// Byte extents of each transport buffer in a serialized stream
///
/// Diagnostic helper for boundary tests and buffer accounting: returns
/// `(offset, total_len)` pairs, framing included.
pub fn dma_buffer_extents(
    bytes: &[u8],
    include_write_size: bool,
) -> ProtocolResult<Vec<(usize, usize)>> {
    let prefix = prefix_len(include_write_size);
    let mut extents = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        if bytes.len() - offset < prefix {
            return Err(ProtocolError::buffer_too_small(
                offset + prefix,
                bytes.len(),
                "transport buffer prefix",
            ));
        }
        let word_at = offset + prefix - 8;
        let transport = u64::from_le_bytes(bytes[word_at..word_at + 8].try_into().unwrap());
        if transport < TRANSPORT_SIZE_BIAS {
            return Err(ProtocolError::data_corruption(
                offset,
                transport as usize,
                0,
                "transport size word below minimum",
            ));
        }
        let total = prefix + (transport - TRANSPORT_SIZE_BIAS) as usize;
        extents.push((offset, total));
        offset += total;
    }
    Ok(extents)
}
