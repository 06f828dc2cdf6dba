//! GATT characteristic handling.
//!
//! Resolves services and characteristics on a connected peripheral, reads
//! values and routes notifications to registered handlers.

use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::ble::transport::{
    CharacteristicProperties, NotifyHandler, RemoteCharacteristic, RemoteService,
};
use crate::error::{Error, Result};

/// Handler for GATT characteristics on one peripheral.
pub struct CharacteristicHandler {
    /// Identifier of the peripheral, copied into resolved handles.
    link: String,
    /// The peripheral to communicate with.
    peripheral: Peripheral,
    /// Notification handlers by characteristic UUID.
    handlers: Arc<RwLock<HashMap<Uuid, NotifyHandler>>>,
    /// Handle to the notification listener task.
    listener_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl CharacteristicHandler {
    /// Create a new characteristic handler for a peripheral.
    ///
    /// Note: Services must be discovered before using this handler.
    pub fn new(link: impl Into<String>, peripheral: Peripheral) -> Self {
        Self {
            link: link.into(),
            peripheral,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            listener_handle: RwLock::new(None),
        }
    }

    /// Look up a discovered service and its characteristics.
    pub fn resolve_service(&self, uuid: &Uuid) -> Option<RemoteService> {
        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == *uuid)?;

        let characteristics = service
            .characteristics
            .iter()
            .map(|c| {
                debug!(
                    "Found characteristic: {} in service {}",
                    c.uuid, service.uuid
                );
                RemoteCharacteristic {
                    link: self.link.clone(),
                    service_uuid: service.uuid,
                    uuid: c.uuid,
                    properties: properties_from_flags(c.properties),
                }
            })
            .collect();

        Some(RemoteService::new(
            self.link.clone(),
            service.uuid,
            characteristics,
        ))
    }

    /// Find the btleplug characteristic backing a resolved handle.
    fn find(&self, uuid: &Uuid) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == *uuid)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }

    /// Read a characteristic value.
    pub async fn read(&self, uuid: &Uuid) -> Result<Vec<u8>> {
        let characteristic = self.find(uuid)?;

        let data = self
            .peripheral
            .read(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        trace!("Read {} bytes from characteristic {}", data.len(), uuid);

        Ok(data)
    }

    /// Subscribe to notifications from a characteristic and route every
    /// payload to `handler`.
    pub async fn subscribe(&self, uuid: &Uuid, handler: NotifyHandler) -> Result<()> {
        debug!("Attempting to subscribe to characteristic: {}", uuid);

        let characteristic = self.find(uuid)?;

        self.start_notifications().await?;
        self.handlers.write().insert(*uuid, handler);

        self.peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| {
                debug!("Failed to subscribe to {}: {:?}", uuid, e);
                self.handlers.write().remove(uuid);
                Error::Bluetooth(e)
            })?;

        debug!("Successfully subscribed to notifications from {}", uuid);

        Ok(())
    }

    /// Start the listener task that dispatches notifications.
    async fn start_notifications(&self) -> Result<()> {
        let running = self.listener_handle.read().is_some();
        if running {
            return Ok(());
        }

        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(Error::Bluetooth)?;

        let handlers = self.handlers.clone();

        let handle = tokio::spawn(async move {
            debug!("Notification listener entering main loop");

            while let Some(notification) = notifications.next().await {
                trace!(
                    "Notification received from {}: {} bytes",
                    notification.uuid,
                    notification.value.len()
                );

                let handler = handlers.read().get(&notification.uuid).cloned();
                match handler {
                    Some(handler) => handler(&notification.value[..]),
                    None => trace!("No handler for {}", notification.uuid),
                }
            }

            error!("Notification stream ended");
        });

        *self.listener_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop listening for notifications.
    pub fn stop_notifications(&self) {
        if let Some(handle) = self.listener_handle.write().take() {
            handle.abort();
        }
        self.handlers.write().clear();
    }
}

impl Drop for CharacteristicHandler {
    fn drop(&mut self) {
        self.stop_notifications();
    }
}

/// Map btleplug property flags to the transport-neutral form.
pub fn properties_from_flags(flags: CharPropFlags) -> CharacteristicProperties {
    CharacteristicProperties {
        read: flags.contains(CharPropFlags::READ),
        write: flags.intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE),
        notify: flags.intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE),
    }
}
