//! Protocol layer modules for the Driftline DAQ system
//!
//! This module contains wire-format definitions: the DMA header overlay,
//! SubEvent/Event header word layouts, and detector payload records.

pub mod constants;
pub mod message;
pub mod payload;

// Re-export key types for convenience with explicit naming to avoid conflicts
pub use constants::{
    ProtocolError, Subsystem, CONTAINER_MAGIC, EVENT_WINDOW_TAG_MASK, FORMAT_VERSION,
    MAX_DMA_SIZE, PACKET_SIZE,
};
pub use message::*;

// Re-export payload records selectively
pub use payload::{
    calorimeter::{CaloBoardStatus, CaloHitHeader},
    crv::{CrvControllerStatus, CrvHitHeader},
    tracker::{TrackerAdcPacket, TrackerHit},
};
