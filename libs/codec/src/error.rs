//! Protocol-level errors for DAQ packet and event processing
//!
//! Provides comprehensive error handling for the Driftline codec, including
//! detailed context for debugging and monitoring. Each error variant includes
//! specific information about what went wrong and what was expected.

use thiserror::Error;
use types::PacketType;

/// Codec errors with comprehensive diagnostic context
///
/// Enhanced error reporting with actionable debugging information.
/// Each error variant includes specific context about what went wrong,
/// buffer state, and actionable troubleshooting guidance.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Decoded packet type tag does not match the requested variant
    #[error("Wrong packet type: expected {expected:?}, got {actual:?} (offset: {offset}, indicates: {diagnosis})")]
    WrongPacketType {
        expected: PacketType,
        actual: PacketType,
        offset: usize,
        diagnosis: String,
    },

    /// Declared byte count inconsistent with the packet count
    #[error("Wrong packet size: byte count {byte_count} does not match 16*(1+{packet_count}) (context: {context})")]
    WrongPacketSize {
        byte_count: usize,
        packet_count: usize,
        context: String,
    },

    /// Buffer is too small to contain the expected structure
    #[error("Buffer too small: need {need} bytes, got {got} (context: {context})")]
    BufferTooSmall {
        need: usize,
        got: usize,
        context: String,
    },

    /// Payload walk overruns a declared boundary - indicates data corruption
    #[error("Data corruption at offset {offset}: {description} (declared: {declared} bytes, consumed: {consumed})")]
    DataCorruption {
        offset: usize,
        declared: usize,
        consumed: usize,
        description: String,
    },

    /// DataBlock observed out of link order inside a SubEvent
    #[error("Block out of order: position {position} expects link {expected_link}, got {actual_link} - blocks must arrive in ascending link order")]
    BlockOutOfOrder {
        position: usize,
        expected_link: u8,
        actual_link: u8,
    },

    /// Child event-window tag disagrees with its parent
    #[error("Event window tag mismatch: expected {expected:#014x}, got {actual:#014x} (origin: {origin})")]
    TagMismatch {
        expected: u64,
        actual: u64,
        origin: u8,
    },

    /// Index into a record collection exceeds its count
    #[error("Index out of range: {index} >= {count} (context: {context})")]
    IndexOutOfRange {
        index: usize,
        count: usize,
        context: String,
    },

    /// Packet already holds the maximum number of independent operations
    #[error("Packet full: already holds {count} operations, limit {limit}")]
    PacketFull { count: usize, limit: usize },

    /// Payload contents invalid for the declared packet kind
    #[error("Invalid payload: {description} (context: {context})")]
    InvalidPayload { description: String, context: String },

    /// Container index sentinel missing or misplaced
    #[error("Missing container index: expected sentinel {expected:#018x} at offset {offset}, found {found:#018x}")]
    MissingIndex {
        expected: u64,
        found: u64,
        offset: usize,
    },

    /// A single child is larger than one transport buffer can carry
    #[error("Oversized block: {size} bytes exceeds transport capacity {capacity} (consider: {recommendation})")]
    OversizedBlock {
        size: usize,
        capacity: usize,
        recommendation: String,
    },

    /// Write or grow attempted on a view-mode overlay
    #[error("Packet is read-only: {context}")]
    ReadOnlyPacket { context: String },

    /// Resize attempted that would shrink an owning packet
    #[error("Invalid resize: {requested} bytes would shrink current {current} - packets only grow")]
    InvalidResize { requested: usize, current: usize },

    /// Wire-format field error from the types layer
    #[error("Field error: {0}")]
    Field(#[from] types::ProtocolError),

    /// Underlying stream failure during serialization
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Io(err.to_string())
    }
}

impl ProtocolError {
    /// Create enhanced WrongPacketType error with diagnostic context
    pub fn wrong_packet_type(expected: PacketType, actual: PacketType, offset: usize) -> Self {
        let diagnosis = match actual {
            PacketType::Invalid => "uninitialized or discarded packet",
            _ => "misrouted packet or cursor desynchronization",
        };
        Self::WrongPacketType {
            expected,
            actual,
            offset,
            diagnosis: diagnosis.to_string(),
        }
    }

    /// Create enhanced WrongPacketSize error with diagnostic context
    pub fn wrong_packet_size(
        byte_count: usize,
        packet_count: usize,
        context: impl Into<String>,
    ) -> Self {
        Self::WrongPacketSize {
            byte_count,
            packet_count,
            context: context.into(),
        }
    }

    /// Create enhanced BufferTooSmall error with diagnostic context
    pub fn buffer_too_small(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::BufferTooSmall {
            need,
            got,
            context: context.into(),
        }
    }

    /// Create enhanced DataCorruption error with diagnostic context
    pub fn data_corruption(
        offset: usize,
        declared: usize,
        consumed: usize,
        description: impl Into<String>,
    ) -> Self {
        Self::DataCorruption {
            offset,
            declared,
            consumed,
            description: description.into(),
        }
    }

    /// Create enhanced OversizedBlock error
    pub fn oversized_block(size: usize, capacity: usize) -> Self {
        let recommendation = if size > capacity * 4 {
            "likely corrupted byte count - validate the DataBlock header"
        } else {
            "split the block across event windows or raise the transport bound"
        };
        Self::OversizedBlock {
            size,
            capacity,
            recommendation: recommendation.to_string(),
        }
    }

    /// Create enhanced IndexOutOfRange error
    pub fn index_out_of_range(index: usize, count: usize, context: impl Into<String>) -> Self {
        Self::IndexOutOfRange {
            index,
            count,
            context: context.into(),
        }
    }

    /// Create enhanced InvalidPayload error
    pub fn invalid_payload(description: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InvalidPayload {
            description: description.into(),
            context: context.into(),
        }
    }
}

/// Result type for codec operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Legacy alias for ParseResult - maintains compatibility with existing code
pub type ParseResult<T> = ProtocolResult<T>;
