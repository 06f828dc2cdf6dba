//! Protocol module for the distance wire format.
//!
//! Frames are plain text so that any generic BLE client can display them.

pub mod frame;

pub use frame::{decode_distance, decode_distance_lossy, encode_distance};
