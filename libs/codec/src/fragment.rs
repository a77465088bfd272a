//! # Container Fragment Writer - Aggregated Records Behind a Random-Access Index
//!
//! ## Purpose
//!
//! Aggregates the DataBlocks of many framed Events into a single payload of
//! inner records followed, at `index_offset`, by an array of `N+1` cumulative
//! end offsets whose final entry is the [`CONTAINER_MAGIC`] sentinel.
//! Adjacent DataBlocks sharing origin device, link, and hop count coalesce
//! into one inner record, reducing record count when a single physical source
//! contributed several blocks.
//!
//! ## Growth discipline
//!
//! The backing store is addressed exclusively by integer offsets; growth
//! reallocates the `Vec` but no pointer into it is ever cached, so there is
//! nothing to re-derive after a resize. Growth reserves a 30% cushion over
//! the computed requirement to amortize future use.

use crate::block::DataBlock;
use crate::error::{ProtocolError, ProtocolResult};
use crate::event::Event;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use types::{ContainerRecordHeader, Subsystem, CONTAINER_MAGIC};
use zerocopy::{AsBytes, FromBytes};

/// Inner records and the index are 8-byte aligned
const RECORD_ALIGN: usize = 8;

/// Writer format version stamped into every inner record header
const WRITER_VERSION: u16 = 1;

fn align_up(value: usize) -> usize {
    value.div_ceil(RECORD_ALIGN) * RECORD_ALIGN
}

fn current_timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// One coalesced run of blocks destined for a single inner record
struct PlannedRecord<'a> {
    subsystem: Subsystem,
    blocks: Vec<&'a DataBlock>,
    byte_sum: usize,
}

/// Builder for a container fragment
pub struct ContainerFragmentWriter {
    store: Vec<u8>,
    payload_len: usize,
    record_ends: Vec<u64>,
    sequence_id: u64,
    timestamp: u64,
    index_offset: usize,
    has_index: bool,
}

impl ContainerFragmentWriter {
    /// Writer stamped with an explicit sequence/time identifier
    pub fn new(sequence_id: u64, timestamp: u64) -> Self {
        Self {
            store: Vec::new(),
            payload_len: 0,
            record_ends: Vec::new(),
            sequence_id,
            timestamp,
            index_offset: 0,
            has_index: false,
        }
    }

    /// Writer stamped with the current wall-clock time
    pub fn with_current_timestamp(sequence_id: u64) -> Self {
        Self::new(sequence_id, current_timestamp_ns())
    }

    /// Aggregate the DataBlocks of `events` and build the trailing index
    ///
    /// Subsystems are walked in fixed order; within each, contributing
    /// Events' SubEvents' DataBlocks. The `has_index` flag flips only after
    /// the index copy completes, so a concurrent reader of the store never
    /// observes a partially written index.
    pub fn write_events(&mut self, events: &[&Event]) -> ProtocolResult<()> {
        let plan = plan_records(events);
        let record_count = plan.len();

        let payload_bytes: usize = plan
            .iter()
            .map(|record| ContainerRecordHeader::SIZE + align_up(record.byte_sum))
            .sum();
        let index_bytes = (record_count + 1) * 8;
        self.grow_to(payload_bytes + index_bytes);

        for record in &plan {
            self.append_record(record)?;
        }

        self.index_offset = self.payload_len;
        let mut offsets: Vec<u64> = self.record_ends.clone();
        offsets.push(CONTAINER_MAGIC);
        let index_end = self.index_offset + offsets.len() * 8;
        self.grow_to(index_end);
        for (slot, offset) in offsets.iter().enumerate() {
            let at = self.index_offset + slot * 8;
            self.store[at..at + 8].copy_from_slice(&offset.to_le_bytes());
        }
        self.has_index = true;

        debug!(
            records = record_count,
            payload_bytes = self.payload_len,
            index_offset = self.index_offset,
            "container fragment assembled"
        );
        Ok(())
    }

    /// Number of inner records written so far
    pub fn record_count(&self) -> usize {
        self.record_ends.len()
    }

    /// Byte offset of the index array
    pub fn index_offset(&self) -> usize {
        self.index_offset
    }

    /// True once the index copy is complete
    pub fn has_index(&self) -> bool {
        self.has_index
    }

    /// Finish writing and hand over the container
    pub fn finish(self) -> ProtocolResult<ContainerFragment> {
        if !self.has_index {
            return Err(ProtocolError::MissingIndex {
                expected: CONTAINER_MAGIC,
                found: 0,
                offset: self.index_offset,
            });
        }
        let end = self.index_offset + (self.record_ends.len() + 1) * 8;
        let mut bytes = self.store;
        bytes.truncate(end);
        ContainerFragment::parse(bytes, self.index_offset)
    }

    /// Ensure the store covers `needed` bytes, growing with a 30% cushion
    fn grow_to(&mut self, needed: usize) {
        if self.store.len() < needed {
            self.store.resize(needed + needed * 3 / 10, 0);
        }
    }

    fn append_record(&mut self, record: &PlannedRecord<'_>) -> ProtocolResult<()> {
        let padded = align_up(record.byte_sum);
        let word_count = ContainerRecordHeader::SIZE_WORDS + (padded / 8) as u32;
        let header = ContainerRecordHeader {
            sequence_id: self.sequence_id,
            timestamp: self.timestamp,
            word_count,
            version: WRITER_VERSION,
            type_tag: record.subsystem as u8,
            flags: 0,
        };

        let record_len = ContainerRecordHeader::SIZE + padded;
        self.grow_to(self.payload_len + record_len);

        let mut at = self.payload_len;
        self.store[at..at + ContainerRecordHeader::SIZE].copy_from_slice(header.as_bytes());
        at += ContainerRecordHeader::SIZE;
        for block in &record.blocks {
            self.store[at..at + block.byte_size()].copy_from_slice(block.bytes());
            at += block.byte_size();
        }
        self.store[at..self.payload_len + record_len].fill(0);

        self.payload_len += record_len;
        self.record_ends.push(self.payload_len as u64);
        Ok(())
    }
}

/// Walk subsystems in fixed order and coalesce adjacent same-origin blocks
fn plan_records<'a>(events: &[&'a Event]) -> Vec<PlannedRecord<'a>> {
    let mut plan: Vec<PlannedRecord<'a>> = Vec::new();

    for subsystem in Subsystem::ALL {
        let mut run_key: Option<(u8, u8, u8)> = None;
        for event in events {
            for sub_event in event.sub_events() {
                for block in sub_event.blocks() {
                    if block.header().subsystem_id != subsystem as u8 {
                        continue;
                    }
                    let key = (
                        block.header().source_id,
                        block.link(),
                        block.header().hop_count,
                    );
                    match (&run_key, plan.last_mut()) {
                        (Some(current), Some(last)) if *current == key => {
                            last.blocks.push(block);
                            last.byte_sum += block.byte_size();
                        }
                        _ => {
                            plan.push(PlannedRecord {
                                subsystem,
                                blocks: vec![block],
                                byte_sum: block.byte_size(),
                            });
                            run_key = Some(key);
                        }
                    }
                }
            }
        }
    }
    plan
}

fn validate_index(bytes: &[u8], index_offset: usize) -> ProtocolResult<Vec<u64>> {
    if bytes.len() < index_offset + 8 || (bytes.len() - index_offset) % 8 != 0 {
        return Err(ProtocolError::buffer_too_small(
            index_offset + 8,
            bytes.len(),
            "container index",
        ));
    }

    let sentinel_at = bytes.len() - 8;
    let sentinel = u64::from_le_bytes(bytes[sentinel_at..].try_into().unwrap());
    if sentinel != CONTAINER_MAGIC {
        return Err(ProtocolError::MissingIndex {
            expected: CONTAINER_MAGIC,
            found: sentinel,
            offset: sentinel_at,
        });
    }

    let count = (bytes.len() - index_offset) / 8 - 1;
    let mut ends = Vec::with_capacity(count);
    let mut previous = 0u64;
    for slot in 0..count {
        let at = index_offset + slot * 8;
        let end = u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap());
        if end < previous || end as usize > index_offset {
            return Err(ProtocolError::data_corruption(
                at,
                index_offset,
                end as usize,
                "container index entry out of bounds",
            ));
        }
        previous = end;
        ends.push(end);
    }
    if let Some(&last) = ends.last() {
        if last as usize != index_offset {
            return Err(ProtocolError::data_corruption(
                index_offset,
                index_offset,
                last as usize,
                "final index entry does not meet the index offset",
            ));
        }
    }
    Ok(ends)
}

/// A parsed container fragment owning its bytes
#[derive(Debug, Clone)]
pub struct ContainerFragment {
    bytes: Vec<u8>,
    index_offset: usize,
    ends: Vec<u64>,
}

impl ContainerFragment {
    /// Validate the index and take ownership of the container bytes
    pub fn parse(bytes: Vec<u8>, index_offset: usize) -> ProtocolResult<Self> {
        let ends = validate_index(&bytes, index_offset)?;
        Ok(Self {
            bytes,
            index_offset,
            ends,
        })
    }

    pub fn count(&self) -> usize {
        self.ends.len()
    }

    pub fn index_offset(&self) -> usize {
        self.index_offset
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Inner record `i` (header plus payload), ending exactly at `index[i]`
    pub fn at(&self, index: usize) -> ProtocolResult<&[u8]> {
        record_slice(&self.bytes, &self.ends, index)
    }

    /// Decoded header and payload of inner record `i`
    pub fn record(&self, index: usize) -> ProtocolResult<(ContainerRecordHeader, &[u8])> {
        split_record(self.at(index)?)
    }
}

/// Borrowed view over an externally supplied container
#[derive(Debug, Clone)]
pub struct ContainerFragmentView<'a> {
    bytes: &'a [u8],
    index_offset: usize,
    ends: Vec<u64>,
}

impl<'a> ContainerFragmentView<'a> {
    pub fn parse(bytes: &'a [u8], index_offset: usize) -> ProtocolResult<Self> {
        let ends = validate_index(bytes, index_offset)?;
        Ok(Self {
            bytes,
            index_offset,
            ends,
        })
    }

    pub fn count(&self) -> usize {
        self.ends.len()
    }

    pub fn index_offset(&self) -> usize {
        self.index_offset
    }

    /// Inner record `i` (header plus payload), ending exactly at `index[i]`
    pub fn at(&self, index: usize) -> ProtocolResult<&'a [u8]> {
        record_slice(self.bytes, &self.ends, index)
    }

    /// Decoded header and payload of inner record `i`
    pub fn record(&self, index: usize) -> ProtocolResult<(ContainerRecordHeader, &'a [u8])> {
        split_record(self.at(index)?)
    }
}

fn record_slice<'b>(bytes: &'b [u8], ends: &[u64], index: usize) -> ProtocolResult<&'b [u8]> {
    if index >= ends.len() {
        return Err(ProtocolError::index_out_of_range(
            index,
            ends.len(),
            "container records",
        ));
    }
    let start = if index == 0 {
        0
    } else {
        ends[index - 1] as usize
    };
    Ok(&bytes[start..ends[index] as usize])
}

fn split_record(record: &[u8]) -> ProtocolResult<(ContainerRecordHeader, &[u8])> {
    let header = ContainerRecordHeader::read_from(&record[..ContainerRecordHeader::SIZE.min(record.len())])
        .ok_or_else(|| {
            ProtocolError::buffer_too_small(
                ContainerRecordHeader::SIZE,
                record.len(),
                "container record header",
            )
        })?;
    Ok((header, &record[ContainerRecordHeader::SIZE..]))
}
