//! BLE scanning functionality.
//!
//! Bounded scans that stop at the first device advertising a given service.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::advertising::AdvertisedDevice;
use crate::error::{Error, Result};

/// BLE scanner for discovering the rangefinder peripheral.
pub struct BleScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Peripherals matched by earlier scans, by identifier.
    discovered: Arc<RwLock<HashMap<String, Peripheral>>>,
}

impl BleScanner {
    /// Create a new BLE scanner on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a new BLE scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            discovered: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Get a peripheral returned by an earlier scan.
    pub fn peripheral(&self, identifier: &str) -> Option<Peripheral> {
        self.discovered.read().get(identifier).cloned()
    }

    /// Scan for up to `duration` and return the first device advertising
    /// `service`. The scan is stopped as soon as a match is seen; later
    /// candidates are not considered.
    pub async fn scan_for_service(
        &self,
        duration: Duration,
        service: Uuid,
    ) -> Result<Option<AdvertisedDevice>> {
        info!("Starting BLE scan for service {} ({:?})", service, duration);

        let mut events = self.adapter.events().await?;

        self.adapter
            .start_scan(ScanFilter {
                services: vec![service],
            })
            .await
            .map_err(Error::Bluetooth)?;

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        let found = loop {
            tokio::select! {
                Some(event) = events.next() => {
                    let id = match event {
                        CentralEvent::DeviceDiscovered(id)
                        | CentralEvent::DeviceUpdated(id)
                        | CentralEvent::ServicesAdvertisement { id, .. } => id,
                        _ => continue,
                    };

                    if let Some(device) = self.inspect(&id, service).await {
                        break Some(device);
                    }
                }
                _ = &mut deadline => {
                    debug!("Scan window elapsed without a match");
                    break None;
                }
            }
        };

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        Ok(found)
    }

    /// Check one peripheral against the wanted service.
    async fn inspect(&self, id: &PeripheralId, service: Uuid) -> Option<AdvertisedDevice> {
        let peripheral = match self.adapter.peripheral(id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return None;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return None,
        };

        let mut device =
            AdvertisedDevice::new(id.to_string()).with_services(properties.services.clone());
        device.local_name = properties.local_name.clone();
        device.rssi = properties.rssi;

        trace!("BLE advertised device found: {}", device);

        if !device.is_advertising_service(&service) {
            return None;
        }

        info!("Found rangefinder peripheral: {}", device);

        self.discovered
            .write()
            .insert(device.identifier.clone(), peripheral);

        Some(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BleScanner>();
    }
}
