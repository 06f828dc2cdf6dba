//! Discovered advertiser description.
//!
//! What a scan reports about a device: enough to decide whether it carries
//! the rangefinder service and to connect to it afterwards.

use uuid::Uuid;

/// A device seen while scanning.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvertisedDevice {
    /// Transport-specific identifier (BLE address or platform UUID).
    pub identifier: String,
    /// Advertised local name, if any.
    pub local_name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
    /// Service UUIDs carried in the advertisement.
    pub services: Vec<Uuid>,
}

impl AdvertisedDevice {
    /// Create a device description with only an identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Set the advertised local name.
    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    /// Set the advertised services.
    pub fn with_services(mut self, services: Vec<Uuid>) -> Self {
        self.services = services;
        self
    }

    /// Set the signal strength.
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Check whether the advertisement lists `service`.
    pub fn is_advertising_service(&self, service: &Uuid) -> bool {
        self.services.contains(service)
    }

    /// Name for log lines: the local name if present, otherwise the identifier.
    pub fn display_name(&self) -> &str {
        self.local_name.as_deref().unwrap_or(&self.identifier)
    }
}

impl std::fmt::Display for AdvertisedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier)?;
        if let Some(ref name) = self.local_name {
            write!(f, " ({})", name)?;
        }
        if let Some(rssi) = self.rssi {
            write!(f, " {} dBm", rssi)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{DISTANCE_CHARACTERISTIC_UUID, RANGEFINDER_SERVICE_UUID};

    #[test]
    fn test_is_advertising_service() {
        let device = AdvertisedDevice::new("AA:BB:CC:DD:EE:FF")
            .with_services(vec![RANGEFINDER_SERVICE_UUID]);
        assert!(device.is_advertising_service(&RANGEFINDER_SERVICE_UUID));
        assert!(!device.is_advertising_service(&DISTANCE_CHARACTERISTIC_UUID));
    }

    #[test]
    fn test_display_name() {
        let device = AdvertisedDevice::new("AA:BB");
        assert_eq!(device.display_name(), "AA:BB");

        let device = device.with_local_name("XIAO_ESP32S3_liliana").with_rssi(-61);
        assert_eq!(device.display_name(), "XIAO_ESP32S3_liliana");
        assert_eq!(device.to_string(), "AA:BB (XIAO_ESP32S3_liliana) -61 dBm");
    }
}
