//! In-process transport joining a peripheral and a central.
//!
//! [`Loopback`] implements both [`PeripheralTransport`] and
//! [`CentralTransport`] over shared memory. A central scanning it finds the
//! peripheral only while it advertises; connecting stops advertising and
//! raises the peripheral's attach callback; publishing delivers straight to
//! the central's notification handler. [`Loopback::attach`] and
//! [`Loopback::sever`] simulate a subscriber arriving and the link dropping.
//!
//! Callbacks are always invoked after the internal lock is released.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ble::advertising::AdvertisedDevice;
use crate::ble::transport::{
    CentralTransport, CharacteristicProperties, Link, LinkHandler, NotifyHandler,
    PeripheralTransport, RemoteCharacteristic, RemoteService,
};
use crate::error::{Error, Result};

/// Identifier reported for the in-process peripheral.
pub const LOOPBACK_IDENTIFIER: &str = "loopback";

/// The single service a loopback peripheral exposes.
#[derive(Debug, Clone)]
struct GattEntry {
    service: Uuid,
    characteristic: Uuid,
    value: Bytes,
}

#[derive(Default)]
struct LoopbackState {
    local_name: Option<String>,
    advertising: Option<Uuid>,
    advertise_count: usize,
    gatt: Option<GattEntry>,
    connected: bool,
    published: Vec<Bytes>,
    delivered: usize,
    on_attached: Option<LinkHandler>,
    on_detached: Option<LinkHandler>,
    on_notify: Option<NotifyHandler>,
    on_disconnect: Option<LinkHandler>,
}

/// Shared-memory transport used by tests and demos.
#[derive(Default)]
pub struct Loopback {
    state: Mutex<LoopbackState>,
}

impl Loopback {
    /// Create an idle loopback with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loopback whose peripheral advertises `name`.
    pub fn with_local_name(name: impl Into<String>) -> Self {
        let loopback = Self::default();
        loopback.state.lock().local_name = Some(name.into());
        loopback
    }

    /// Check if the peripheral is currently discoverable.
    pub fn is_advertising(&self) -> bool {
        self.state.lock().advertising.is_some()
    }

    /// How many times advertising has been started.
    pub fn advertise_count(&self) -> usize {
        self.state.lock().advertise_count
    }

    /// Check if a central is attached.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Every payload passed to `publish`, delivered or not.
    pub fn published(&self) -> Vec<Bytes> {
        self.state.lock().published.clone()
    }

    /// Number of payloads that reached a subscribed central.
    pub fn delivered_count(&self) -> usize {
        self.state.lock().delivered
    }

    /// Current characteristic value.
    pub fn value(&self) -> Option<Bytes> {
        self.state.lock().gatt.as_ref().map(|g| g.value.clone())
    }

    /// Simulate a central attaching without going through scan/connect.
    pub fn attach(&self) {
        let on_attached = {
            let mut state = self.state.lock();
            if state.connected {
                return;
            }
            state.connected = true;
            state.advertising = None;
            state.on_attached.clone()
        };

        debug!("Loopback subscriber attached");
        if let Some(handler) = on_attached {
            handler();
        }
    }

    /// Simulate the link dropping. Both sides are told.
    pub fn sever(&self) {
        let (on_detached, on_disconnect) = {
            let mut state = self.state.lock();
            if !state.connected {
                return;
            }
            state.connected = false;
            state.on_notify = None;
            (state.on_detached.clone(), state.on_disconnect.take())
        };

        info!("Loopback link severed");
        if let Some(handler) = on_detached {
            handler();
        }
        if let Some(handler) = on_disconnect {
            handler();
        }
    }

    fn resolved_characteristic(gatt: &GattEntry) -> RemoteCharacteristic {
        RemoteCharacteristic {
            link: LOOPBACK_IDENTIFIER.to_string(),
            service_uuid: gatt.service,
            uuid: gatt.characteristic,
            properties: CharacteristicProperties::READ_WRITE_NOTIFY,
        }
    }
}

impl std::fmt::Debug for Loopback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Loopback")
            .field("advertising", &state.advertising)
            .field("connected", &state.connected)
            .field("published", &state.published.len())
            .finish()
    }
}

#[async_trait]
impl PeripheralTransport for Loopback {
    fn set_subscriber_handlers(&self, on_attached: LinkHandler, on_detached: LinkHandler) {
        let mut state = self.state.lock();
        state.on_attached = Some(on_attached);
        state.on_detached = Some(on_detached);
    }

    async fn register_service(
        &self,
        service: Uuid,
        characteristic: Uuid,
        initial_value: &[u8],
    ) -> Result<()> {
        self.state.lock().gatt = Some(GattEntry {
            service,
            characteristic,
            value: Bytes::copy_from_slice(initial_value),
        });
        Ok(())
    }

    async fn start_advertising(&self, service: Uuid) -> Result<()> {
        let mut state = self.state.lock();
        state.advertising = Some(service);
        state.advertise_count += 1;
        Ok(())
    }

    async fn publish(&self, characteristic: Uuid, value: &[u8]) -> Result<()> {
        let payload = Bytes::copy_from_slice(value);

        let on_notify = {
            let mut state = self.state.lock();
            match state.gatt.as_mut() {
                Some(gatt) if gatt.characteristic == characteristic => {
                    gatt.value = payload.clone();
                }
                _ => {
                    return Err(Error::CharacteristicNotFound {
                        uuid: characteristic.to_string(),
                    })
                }
            }
            state.published.push(payload.clone());
            if state.connected {
                state.on_notify.clone()
            } else {
                None
            }
        };

        if let Some(handler) = on_notify {
            handler(&payload[..]);
            self.state.lock().delivered += 1;
        }

        Ok(())
    }
}

#[async_trait]
impl CentralTransport for Loopback {
    async fn scan(&self, _duration: Duration, service: Uuid) -> Result<Option<AdvertisedDevice>> {
        let state = self.state.lock();
        if state.advertising != Some(service) {
            return Ok(None);
        }

        let mut device = AdvertisedDevice::new(LOOPBACK_IDENTIFIER).with_services(vec![service]);
        if let Some(ref name) = state.local_name {
            device = device.with_local_name(name.clone());
        }
        Ok(Some(device))
    }

    async fn connect(
        &self,
        device: &AdvertisedDevice,
        on_disconnect: LinkHandler,
    ) -> Result<Link> {
        if device.identifier != LOOPBACK_IDENTIFIER {
            return Err(Error::ConnectionFailed {
                reason: format!("unknown device {}", device.identifier),
            });
        }

        {
            let mut state = self.state.lock();
            if state.connected {
                return Err(Error::ConnectionFailed {
                    reason: "peripheral already has a subscriber".to_string(),
                });
            }
            state.on_disconnect = Some(on_disconnect);
        }

        self.attach();
        Ok(Link::new(LOOPBACK_IDENTIFIER))
    }

    async fn resolve_service(&self, link: &Link, service: Uuid) -> Result<Option<RemoteService>> {
        let state = self.state.lock();
        if !state.connected || link.identifier != LOOPBACK_IDENTIFIER {
            return Err(Error::NotConnected);
        }

        Ok(state
            .gatt
            .as_ref()
            .filter(|g| g.service == service)
            .map(|g| {
                RemoteService::new(
                    LOOPBACK_IDENTIFIER,
                    g.service,
                    vec![Self::resolved_characteristic(g)],
                )
            }))
    }

    async fn resolve_characteristic(
        &self,
        service: &RemoteService,
        characteristic: Uuid,
    ) -> Result<Option<RemoteCharacteristic>> {
        Ok(service.characteristic(&characteristic).cloned())
    }

    async fn read_once(&self, characteristic: &RemoteCharacteristic) -> Result<Vec<u8>> {
        let state = self.state.lock();
        state
            .gatt
            .as_ref()
            .filter(|g| g.characteristic == characteristic.uuid)
            .map(|g| g.value.to_vec())
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: characteristic.uuid.to_string(),
            })
    }

    async fn subscribe(
        &self,
        characteristic: &RemoteCharacteristic,
        on_notify: NotifyHandler,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        debug!("Loopback subscription to {}", characteristic.uuid);
        state.on_notify = Some(on_notify);
        Ok(())
    }

    async fn disconnect(&self, _link: &Link) -> Result<()> {
        self.sever();
        Ok(())
    }
}
