//! Capability traits over the wireless transport.
//!
//! The session state machines never talk to a radio directly. They are
//! handed a transport implementing one of these traits and register plain
//! closures for the events the transport raises. Callbacks may be invoked
//! from any task and must not block.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::ble::advertising::AdvertisedDevice;
use crate::error::Result;

/// Callback for a link coming up or going down.
pub type LinkHandler = Arc<dyn Fn() + Send + Sync>;

/// Callback receiving the payload of each notification.
pub type NotifyHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// An established connection to a remote peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Identifier of the connected device.
    pub identifier: String,
}

impl Link {
    /// Create a link handle for a device identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

/// GATT properties relevant to the central.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicProperties {
    /// The value can be read.
    pub read: bool,
    /// The value can be written.
    pub write: bool,
    /// The peripheral can push notifications.
    pub notify: bool,
}

impl CharacteristicProperties {
    /// Read, write and notify, as exposed by the rangefinder peripheral.
    pub const READ_WRITE_NOTIFY: Self = Self {
        read: true,
        write: true,
        notify: true,
    };
}

/// A characteristic resolved on a remote device.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCharacteristic {
    /// Identifier of the device it lives on.
    pub link: String,
    /// UUID of the owning service.
    pub service_uuid: Uuid,
    /// UUID of the characteristic.
    pub uuid: Uuid,
    /// Supported operations.
    pub properties: CharacteristicProperties,
}

impl RemoteCharacteristic {
    /// Check if a one-off read is supported.
    pub fn can_read(&self) -> bool {
        self.properties.read
    }

    /// Check if notifications are supported.
    pub fn can_notify(&self) -> bool {
        self.properties.notify
    }
}

/// A service resolved on a remote device.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteService {
    /// Identifier of the device it lives on.
    pub link: String,
    /// UUID of the service.
    pub uuid: Uuid,
    /// Characteristics discovered in the service.
    pub characteristics: Vec<RemoteCharacteristic>,
}

impl RemoteService {
    /// Create a resolved service.
    pub fn new(
        link: impl Into<String>,
        uuid: Uuid,
        characteristics: Vec<RemoteCharacteristic>,
    ) -> Self {
        Self {
            link: link.into(),
            uuid,
            characteristics,
        }
    }

    /// Find a characteristic by UUID.
    pub fn characteristic(&self, uuid: &Uuid) -> Option<&RemoteCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == *uuid)
    }
}

/// Transport operations needed by the central role.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CentralTransport: Send + Sync {
    /// Scan for up to `duration` and return the first device advertising
    /// `service`. Scanning stops as soon as a match is found.
    async fn scan(&self, duration: Duration, service: Uuid) -> Result<Option<AdvertisedDevice>>;

    /// Connect to a discovered device. `on_disconnect` fires when the link
    /// drops for any reason after this call succeeds.
    async fn connect(&self, device: &AdvertisedDevice, on_disconnect: LinkHandler)
        -> Result<Link>;

    /// Look up a service on a connected device.
    async fn resolve_service(&self, link: &Link, service: Uuid) -> Result<Option<RemoteService>>;

    /// Look up a characteristic within a resolved service.
    async fn resolve_characteristic(
        &self,
        service: &RemoteService,
        characteristic: Uuid,
    ) -> Result<Option<RemoteCharacteristic>>;

    /// Read the current value once.
    async fn read_once(&self, characteristic: &RemoteCharacteristic) -> Result<Vec<u8>>;

    /// Enable notifications and route each payload to `on_notify`.
    async fn subscribe(
        &self,
        characteristic: &RemoteCharacteristic,
        on_notify: NotifyHandler,
    ) -> Result<()>;

    /// Tear the link down.
    async fn disconnect(&self, link: &Link) -> Result<()>;
}

/// Transport operations needed by the peripheral role.
#[async_trait]
pub trait PeripheralTransport: Send + Sync {
    /// Install the callbacks fired when a central subscribes or goes away.
    fn set_subscriber_handlers(&self, on_attached: LinkHandler, on_detached: LinkHandler);

    /// Expose `service` with a single characteristic holding `initial_value`.
    async fn register_service(
        &self,
        service: Uuid,
        characteristic: Uuid,
        initial_value: &[u8],
    ) -> Result<()>;

    /// Become discoverable, advertising `service`.
    async fn start_advertising(&self, service: Uuid) -> Result<()>;

    /// Set the characteristic value and notify the subscriber, if any.
    async fn publish(&self, characteristic: Uuid, value: &[u8]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{DISTANCE_CHARACTERISTIC_UUID, RANGEFINDER_SERVICE_UUID};

    #[test]
    fn test_service_characteristic_lookup() {
        let characteristic = RemoteCharacteristic {
            link: "AA:BB".to_string(),
            service_uuid: RANGEFINDER_SERVICE_UUID,
            uuid: DISTANCE_CHARACTERISTIC_UUID,
            properties: CharacteristicProperties::READ_WRITE_NOTIFY,
        };
        let service = RemoteService::new("AA:BB", RANGEFINDER_SERVICE_UUID, vec![characteristic]);

        let found = service.characteristic(&DISTANCE_CHARACTERISTIC_UUID).unwrap();
        assert!(found.can_read());
        assert!(found.can_notify());
        assert!(service.characteristic(&RANGEFINDER_SERVICE_UUID).is_none());
    }
}
