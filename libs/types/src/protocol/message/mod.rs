//! Packet and assembly-header layouts
//!
//! The DMA header prefixes every 16-byte hardware packet; the SubEvent and
//! Event headers frame the assembly hierarchy above DataBlocks.

pub mod container;
pub mod dma;
pub mod event;

pub use container::ContainerRecordHeader;
pub use dma::{DmaHeader, PacketType};
pub use event::{EventHeader, SubEventHeader};
