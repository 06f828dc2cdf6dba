//! BLE communication module.
//!
//! Capability traits for both roles, the btleplug-backed central transport
//! and an in-process loopback joining the two.

pub mod advertising;
pub mod characteristics;
pub mod connection;
pub mod loopback;
pub mod platform;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use advertising::AdvertisedDevice;
pub use characteristics::CharacteristicHandler;
pub use connection::{ConnectionManager, ConnectionState};
pub use loopback::Loopback;
pub use platform::BtleplugCentral;
pub use scanner::BleScanner;
pub use transport::{
    CentralTransport, CharacteristicProperties, Link, LinkHandler, NotifyHandler,
    PeripheralTransport, RemoteCharacteristic, RemoteService,
};
pub use uuids::*;
