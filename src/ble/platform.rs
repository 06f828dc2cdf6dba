//! Central transport backed by the host Bluetooth stack.
//!
//! Glues [`BleScanner`], [`ConnectionManager`] and [`CharacteristicHandler`]
//! together behind [`CentralTransport`].

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ble::advertising::AdvertisedDevice;
use crate::ble::characteristics::CharacteristicHandler;
use crate::ble::connection::ConnectionManager;
use crate::ble::scanner::BleScanner;
use crate::ble::transport::{
    CentralTransport, Link, LinkHandler, NotifyHandler, RemoteCharacteristic, RemoteService,
};
use crate::error::{Error, Result};

/// Per-link resources.
struct LinkEntry {
    connection: ConnectionManager,
    characteristics: CharacteristicHandler,
}

/// [`CentralTransport`] over btleplug.
pub struct BtleplugCentral {
    scanner: BleScanner,
    links: RwLock<HashMap<String, Arc<LinkEntry>>>,
}

impl BtleplugCentral {
    /// Open the first Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        Ok(Self::with_scanner(BleScanner::new().await?))
    }

    /// Use an existing scanner.
    pub fn with_scanner(scanner: BleScanner) -> Self {
        Self {
            scanner,
            links: RwLock::new(HashMap::new()),
        }
    }

    /// Get the scanner.
    pub fn scanner(&self) -> &BleScanner {
        &self.scanner
    }

    fn entry(&self, identifier: &str) -> Result<Arc<LinkEntry>> {
        self.links
            .read()
            .get(identifier)
            .cloned()
            .ok_or(Error::NotConnected)
    }
}

#[async_trait]
impl CentralTransport for BtleplugCentral {
    async fn scan(&self, duration: Duration, service: Uuid) -> Result<Option<AdvertisedDevice>> {
        self.scanner.scan_for_service(duration, service).await
    }

    async fn connect(
        &self,
        device: &AdvertisedDevice,
        on_disconnect: LinkHandler,
    ) -> Result<Link> {
        let peripheral =
            self.scanner
                .peripheral(&device.identifier)
                .ok_or_else(|| Error::ConnectionFailed {
                    reason: format!("{} was not found by a scan", device.identifier),
                })?;

        debug!("Forming a connection to {}", device);

        let connection = ConnectionManager::new(self.scanner.adapter().clone(), peripheral.clone());
        connection.connect(on_disconnect).await?;

        let entry = Arc::new(LinkEntry {
            connection,
            characteristics: CharacteristicHandler::new(device.identifier.clone(), peripheral),
        });
        self.links.write().insert(device.identifier.clone(), entry);

        Ok(Link::new(device.identifier.clone()))
    }

    async fn resolve_service(&self, link: &Link, service: Uuid) -> Result<Option<RemoteService>> {
        let entry = self.entry(&link.identifier)?;
        Ok(entry.characteristics.resolve_service(&service))
    }

    async fn resolve_characteristic(
        &self,
        service: &RemoteService,
        characteristic: Uuid,
    ) -> Result<Option<RemoteCharacteristic>> {
        Ok(service.characteristic(&characteristic).cloned())
    }

    async fn read_once(&self, characteristic: &RemoteCharacteristic) -> Result<Vec<u8>> {
        let entry = self.entry(&characteristic.link)?;
        entry.characteristics.read(&characteristic.uuid).await
    }

    async fn subscribe(
        &self,
        characteristic: &RemoteCharacteristic,
        on_notify: NotifyHandler,
    ) -> Result<()> {
        let entry = self.entry(&characteristic.link)?;
        entry
            .characteristics
            .subscribe(&characteristic.uuid, on_notify)
            .await
    }

    async fn disconnect(&self, link: &Link) -> Result<()> {
        let entry = self.links.write().remove(&link.identifier);
        let Some(entry) = entry else {
            warn!("Disconnect requested for unknown link {}", link.identifier);
            return Ok(());
        };

        entry.characteristics.stop_notifications();
        entry.connection.disconnect().await
    }
}
