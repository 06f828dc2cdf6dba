//! BLE connection management.
//!
//! Connects to the rangefinder peripheral and watches the adapter for the
//! link dropping.

use btleplug::api::{Central, CentralEvent, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::ble::transport::LinkHandler;
use crate::error::{Error, Result};

/// Link-level connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not connected to the peripheral.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected to the peripheral.
    Connected,
    /// Currently disconnecting.
    Disconnecting,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Manages the connection to one peripheral.
pub struct ConnectionManager {
    /// The adapter the peripheral was found on.
    adapter: Adapter,
    /// The peripheral to manage.
    peripheral: Peripheral,
    /// Current connection state.
    state: Arc<RwLock<ConnectionState>>,
    /// Handle to the disconnect watcher task.
    watch_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Create a new connection manager for a peripheral.
    pub fn new(adapter: Adapter, peripheral: Peripheral) -> Self {
        Self {
            adapter,
            peripheral,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            watch_handle: RwLock::new(None),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Connect and discover services. `on_disconnect` is called once when
    /// the adapter later reports this peripheral as disconnected.
    pub async fn connect(&self, on_disconnect: LinkHandler) -> Result<()> {
        let current_state = self.state();

        if current_state.is_connected() {
            debug!("Already connected");
            return Ok(());
        }

        if current_state.is_transitioning() {
            return Err(Error::ConnectionFailed {
                reason: "Connection already in progress".to_string(),
            });
        }

        self.set_state(ConnectionState::Connecting);

        // Subscribe before connecting so a drop during discovery is not missed.
        let events = match self.adapter.events().await {
            Ok(events) => events,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(Error::Bluetooth(e));
            }
        };

        if let Err(e) = self.peripheral.connect().await {
            warn!("Connection attempt failed: {}", e);
            self.set_state(ConnectionState::Disconnected);
            return Err(Error::ConnectionFailed {
                reason: e.to_string(),
            });
        }

        info!("Connected to server");

        if let Err(e) = self.peripheral.discover_services().await {
            warn!("Failed to discover services: {}", e);
        }

        self.set_state(ConnectionState::Connected);

        let id = self.peripheral.id();
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            let mut events = events;
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(gone) = event {
                    if gone == id {
                        info!("Peripheral {:?} disconnected", gone);
                        *state.write() = ConnectionState::Disconnected;
                        on_disconnect();
                        break;
                    }
                }
            }
            debug!("Disconnect watcher ended");
        });

        if let Some(old) = self.watch_handle.write().replace(handle) {
            old.abort();
        }

        Ok(())
    }

    /// Disconnect from the peripheral.
    pub async fn disconnect(&self) -> Result<()> {
        let current_state = self.state();

        if matches!(
            current_state,
            ConnectionState::Disconnected | ConnectionState::Disconnecting
        ) {
            return Ok(());
        }

        self.set_state(ConnectionState::Disconnecting);

        match self.peripheral.disconnect().await {
            Ok(_) => {
                info!("Disconnected from peripheral");
                self.set_state(ConnectionState::Disconnected);
                Ok(())
            }
            Err(e) => {
                error!("Failed to disconnect: {}", e);
                self.set_state(ConnectionState::Disconnected);
                Err(Error::Bluetooth(e))
            }
        }
    }

    /// Update the connection state.
    fn set_state(&self, new_state: ConnectionState) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };

        if old_state != new_state {
            debug!("Connection state changed: {} -> {}", old_state, new_state);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.watch_handle.write().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());

        assert!(ConnectionState::Connecting.is_transitioning());
        assert!(ConnectionState::Disconnecting.is_transitioning());
        assert!(!ConnectionState::Connected.is_transitioning());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Connected), "Connected");
        assert_eq!(format!("{}", ConnectionState::Disconnected), "Disconnected");
    }
}
