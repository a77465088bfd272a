//! Detector payload record layouts
//!
//! Per-subsystem hit records carried inside DataBlock payloads. Each record
//! is a fixed-size header followed by a variable-length waveform tail; the
//! walking decoders live in `codec::payloads`.

pub mod calorimeter;
pub mod crv;
pub mod tracker;
