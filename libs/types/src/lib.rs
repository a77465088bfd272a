//! # Driftline Unified Types Library
//!
//! Unified type system for Driftline DAQ packet formats and detector payloads.
//!
//! ## Design Philosophy
//!
//! - **Unified Type System**: Single library for all Driftline wire-format definitions
//! - **Bit-Exact Layouts**: Every header field is read and written by explicit
//!   shift/mask arithmetic over little-endian words, never by reinterpreting a
//!   byte region as a language-level record
//! - **Type Safety**: Distinct enums for packet kinds and detector subsystems
//!   prevent mixing incompatible tags
//! - **Zero-Copy Operations**: zerocopy-enabled structs where the wire layout is
//!   byte-aligned
//! - **Clear Boundaries**: Parsing policy and error recovery live in `codec`;
//!   this crate only knows what the bytes mean
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{DmaHeader, PacketType, Subsystem, PACKET_SIZE};
//!
//! let mut raw = [0u8; PACKET_SIZE];
//! let header = DmaHeader::new(PacketType::DataHeader, Subsystem::Tracker, 3);
//! header.write_to(&mut raw).unwrap();
//!
//! let parsed = DmaHeader::parse(&raw).unwrap();
//! assert_eq!(parsed.packet_type, PacketType::DataHeader);
//! assert_eq!(parsed.link, 3);
//! ```
//!
//! ## Integration Points
//!
//! This library serves the whole Driftline pipeline:
//! - **Packet layer**: DMA header overlay and typed-packet field layouts
//! - **Assembly layer**: SubEvent/Event header word layouts with named bit ranges
//! - **Detector payloads**: tracker, calorimeter, and cosmic-ray-veto hit records
//!   including sub-byte waveform sample packing

pub mod protocol;

// Re-export protocol types for convenience
pub use protocol::*;

// Re-export core protocol types that are commonly used in imports
pub use protocol::message::dma::{DmaHeader, PacketType};
pub use protocol::message::event::{EventHeader, SubEventHeader};
pub use protocol::{ProtocolError, Subsystem};

// Define Result type alias
pub type Result<T> = std::result::Result<T, anyhow::Error>;

// Re-export protocol constants
pub use protocol::{
    CONTAINER_MAGIC, EVENT_WINDOW_TAG_MASK, FORMAT_VERSION, MAX_DMA_SIZE, PACKET_SIZE,
};
