// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # rangefinder-link
//!
//! A BLE link between an ultrasonic rangefinder (the peripheral) and an
//! observer (the central).
//!
//! The peripheral smooths raw distance samples with a moving average and
//! notifies `"Distance: <v> cm"` frames once per second while a central is
//! subscribed and the distance is below 30 cm. The central discovers the
//! peripheral by service UUID, subscribes, decodes each frame and keeps the
//! running minimum and maximum.
//!
//! ## Features
//!
//! - **Frame Codec**: `encode_distance` / `decode_distance`
//! - **Moving Average**: fixed-window filter with O(1) updates
//! - **Peripheral Session**: advertising, publish cadence and threshold, re-advertise delay
//! - **Central Session**: scan, connect, resolve, subscribe, optional rescan
//! - **Transports**: btleplug for real hardware, an in-process loopback for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rangefinder_link::{BtleplugCentral, CentralConfig, CentralSession, Result};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = Arc::new(BtleplugCentral::new().await?);
//!     let mut central = CentralSession::new(transport, CentralConfig::default())?;
//!
//!     let mut readings = central.subscribe_readings();
//!     central.establish().await;
//!
//!     while let Ok(reading) = readings.recv().await {
//!         println!(
//!             "{:.2} cm (min {:.2}, max {:.2})",
//!             reading.distance_cm, reading.extrema.min, reading.extrema.max
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! btleplug only supports the central role, so [`PeripheralSession`] runs
//! over any [`PeripheralTransport`] such as [`Loopback`].
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for config and reading types

pub mod ble;
pub mod central;
pub mod config;
pub mod data;
pub mod error;
pub mod peripheral;
pub mod protocol;
pub mod sensor;
pub mod utils;

// Re-exports for convenience
pub use central::{AbortReason, CentralSession, CentralState, Reading};
pub use config::{CentralConfig, MalformedFramePolicy, PeripheralConfig, ReconnectPolicy};
pub use error::{Error, Result};
pub use peripheral::{PeripheralSession, PeripheralState};
pub use sensor::{RangeSensor, ReplaySensor};
pub use utils::{centimeters_to_pulse, pulse_to_centimeters};

pub use ble::{
    AdvertisedDevice, BtleplugCentral, CentralTransport, Loopback, PeripheralTransport,
    DISTANCE_CHARACTERISTIC_UUID, RANGEFINDER_SERVICE_UUID,
};
pub use data::{Extrema, ExtremaTracker, MovingAverage};
pub use protocol::{decode_distance, decode_distance_lossy, encode_distance};
