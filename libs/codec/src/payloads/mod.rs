//! # Detector Payload Decoders
//!
//! ## Purpose
//!
//! Per-subsystem walkers over DataBlock payloads. All three share one state
//! machine: read a fixed header, compute the variable waveform tail, read the
//! tail, advance - terminating at clean exhaustion of the declared length or
//! at a detected overrun. Both terminals return the hits parsed so far;
//! decoders never fail on corrupt payload data, they log and flag it.
//!
//! Subsystem-id and format-version mismatches are logged but not fatal:
//! hardware firmware versions may lag the software, and a single bad hit
//! should not discard an otherwise-valid block.

pub mod calorimeter;
pub mod crv;
pub mod tracker;

pub use calorimeter::{decode_calorimeter_block, CaloBlock, CaloHit};
pub use crv::{decode_crv_block, CrvBlock, CrvHit};
pub use tracker::{decode_tracker_block, TrackerBlock, TrackerHitRecord};
