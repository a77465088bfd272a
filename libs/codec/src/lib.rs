//! # Driftline DAQ Codec - Packet and Event Assembly Rules
//!
//! ## Purpose
//!
//! This crate contains the "Rules" layer of the Driftline pipeline:
//! - Packet overlay with statically separated borrowed/owned capability
//! - Typed packet encoding/decoding with exhaustive tag dispatch
//! - DataBlock → SubEvent → Event hierarchical assembly and validation
//! - Multi-buffer transport serialization with self-describing size prefixes
//! - Container fragment writer aggregating records behind a random-access index
//! - Detector payload decoders for tracker, calorimeter, and cosmic-ray-veto
//!
//! ## Integration Points
//!
//! - **Message Construction**: `Event`/`SubEvent` builders plus `write_event`
//! - **Parsing Validation**: `EventView`/`SubEventView` with eager, two-phase
//!   header-then-body construction
//! - **Aggregation**: `ContainerFragmentWriter` coalescing same-origin runs
//! - **Detector Decoding**: `payloads::*` walkers returning partial results
//!   with explicit corruption flags
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → host framework
//!     ↑           ↓            ↓
//! Pure Data   Assembly      Raw buffers in,
//! Structures  Validation    framed buffers out
//! Layouts     Encoding
//! ```
//!
//! ## What This Crate Contains
//! - Packet overlay (`PacketView`, `OwnedPacket`) and typed packet codecs
//! - Assembly hierarchy with the two named child-failure policies
//! - Transport buffer framing (`write_event` / `read_dma_buffers`)
//! - Container fragment writer and index reader
//! - Detector payload walkers
//!
//! ## What This Crate Does NOT Contain
//! - Transport management (the host supplies and consumes buffers)
//! - Detector physics reconstruction
//! - Raw wire-layout definitions (those belong in libs/types)
//!
//! ## Error Handling Model
//!
//! Packet-level and SubEvent-level decode failures propagate to the caller:
//! a structurally invalid header makes all later offsets in that scope
//! meaningless. Event-level assembly instead truncates and keeps validated
//! children, and detector payload decoders return partial hit lists with a
//! corruption flag. Every recovery path is logged; corruption is never
//! silently absorbed.

// Core modules
pub mod block;
pub mod error;
pub mod event;
pub mod fragment;
pub mod overlay;
pub mod packets;
pub mod payloads;
pub mod subevent;

// Re-export key types for convenience
pub use block::{DataBlock, DataBlockView};
pub use error::{ParseResult, ProtocolError, ProtocolResult};
pub use event::{dma_buffer_extents, read_dma_buffers, Event, EventView};
pub use fragment::{ContainerFragment, ContainerFragmentView, ContainerFragmentWriter};
pub use overlay::{packet_eq, OwnedPacket, PacketBytes, PacketView};
pub use packets::{
    block_extension_packets, ConfigOp, ConfigPayload, ConfigReplyPacket, ConfigRequestPacket,
    DataHeaderPacket, DataRequestPacket, HeartbeatPacket, TypedPacket,
};
pub use payloads::{
    decode_calorimeter_block, decode_crv_block, decode_tracker_block, CaloBlock, CaloHit,
    CrvBlock, CrvHit, TrackerBlock, TrackerHitRecord,
};
pub use subevent::{ChildPolicy, SubEvent, SubEventView};

// Re-export commonly used wire types from libs/types
pub use types::{
    DmaHeader, PacketType, Subsystem, CONTAINER_MAGIC, MAX_DMA_SIZE, PACKET_SIZE,
};
