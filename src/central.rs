//! Central (observer) session.
//!
//! Finds the rangefinder, subscribes to its distance characteristic and
//! keeps running min/max over every reading received.
//!
//! ```text
//!   Scanning -> Connecting -> Resolving -> Subscribed -> Disconnected
//!       \            \            \
//!        +------------+------------+----> Aborted(reason)
//! ```
//!
//! Each call to [`CentralSession::advance`] performs at most one
//! transition. The disconnect callback may move `Subscribed` to
//! `Disconnected` from another task at any time.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::ble::advertising::AdvertisedDevice;
use crate::ble::transport::{CentralTransport, Link, LinkHandler, NotifyHandler};
use crate::ble::uuids::{DISTANCE_CHARACTERISTIC_UUID, RANGEFINDER_SERVICE_UUID};
use crate::config::{CentralConfig, MalformedFramePolicy, ReconnectPolicy};
use crate::data::{Extrema, ExtremaTracker, Session};
use crate::error::Result;
use crate::protocol::decode_distance;

/// Why the central gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AbortReason {
    /// No device advertised the service within the scan window.
    NotFound,
    /// The connection attempt failed.
    ConnectFailed,
    /// The transport failed while resolving or subscribing.
    Transport,
    /// The connected device lacks the rangefinder service.
    ServiceNotFound,
    /// The service lacks the distance characteristic.
    CharacteristicNotFound,
}

impl AbortReason {
    /// Whether a fresh scan could succeed. GATT layout mismatches and
    /// transport failures are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFound | Self::ConnectFailed)
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "device not found"),
            Self::ConnectFailed => write!(f, "connection failed"),
            Self::Transport => write!(f, "transport error"),
            Self::ServiceNotFound => write!(f, "service not found"),
            Self::CharacteristicNotFound => write!(f, "characteristic not found"),
        }
    }
}

/// Central session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CentralState {
    /// Looking for a device advertising the rangefinder service.
    #[default]
    Scanning,
    /// A device was found; connecting to it.
    Connecting,
    /// Connected; looking up the service and characteristic.
    Resolving,
    /// Receiving notifications.
    Subscribed,
    /// The link dropped after subscribing.
    Disconnected,
    /// Gave up.
    Aborted(AbortReason),
}

impl CentralState {
    /// Check if `advance` has nothing left to do from this state.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Subscribed | Self::Disconnected | Self::Aborted(_)
        )
    }
}

impl std::fmt::Display for CentralState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Resolving => write!(f, "Resolving"),
            Self::Subscribed => write!(f, "Subscribed"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Aborted(reason) => write!(f, "Aborted ({})", reason),
        }
    }
}

/// One accepted distance notification.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Decoded distance in centimeters.
    pub distance_cm: f32,
    /// Min/max after this reading was applied.
    pub extrema: Extrema,
    /// When the notification arrived.
    pub received_at: DateTime<Utc>,
}

/// The observer's side of the link.
pub struct CentralSession<T: CentralTransport> {
    transport: Arc<T>,
    config: CentralConfig,
    state: Arc<RwLock<CentralState>>,
    session: Session,
    link: Option<Link>,
    extrema: Arc<Mutex<ExtremaTracker>>,
    readings_tx: broadcast::Sender<Reading>,
}

impl<T: CentralTransport> CentralSession<T> {
    /// Create a session over `transport`, starting in `Scanning`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(transport: Arc<T>, config: CentralConfig) -> Result<Self> {
        config.validate()?;
        let (readings_tx, _) = broadcast::channel(64);

        Ok(Self {
            transport,
            config,
            state: Arc::new(RwLock::new(CentralState::Scanning)),
            session: Session::new(),
            link: None,
            extrema: Arc::new(Mutex::new(ExtremaTracker::new())),
            readings_tx,
        })
    }

    /// Get the current state.
    pub fn state(&self) -> CentralState {
        *self.state.read()
    }

    /// Get the configuration.
    pub fn config(&self) -> &CentralConfig {
        &self.config
    }

    /// Check if the link is up.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// The device found by the last scan.
    pub fn remote(&self) -> Option<&AdvertisedDevice> {
        self.session.remote()
    }

    /// Current min/max.
    pub fn extrema(&self) -> Extrema {
        self.extrema.lock().snapshot()
    }

    /// Number of readings applied to the extrema.
    pub fn reading_count(&self) -> u64 {
        self.extrema.lock().count()
    }

    /// Subscribe to accepted readings.
    pub fn subscribe_readings(&self) -> broadcast::Receiver<Reading> {
        self.readings_tx.subscribe()
    }

    fn set_state(&self, next: CentralState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            debug!("Central state {} -> {}", previous, next);
        }
    }

    /// Perform at most one transition and return the resulting state.
    pub async fn advance(&mut self) -> CentralState {
        match self.state() {
            CentralState::Scanning => self.scan().await,
            CentralState::Connecting => self.connect().await,
            CentralState::Resolving => self.resolve().await,
            CentralState::Subscribed | CentralState::Disconnected | CentralState::Aborted(_) => {}
        }
        self.state()
    }

    /// Advance until subscribed, disconnected or aborted.
    pub async fn establish(&mut self) -> CentralState {
        loop {
            let state = self.advance().await;
            if state.is_settled() {
                return state;
            }
        }
    }

    /// Establish the link and keep watching it every `poll_interval`.
    ///
    /// With [`ReconnectPolicy::Rescan`] a lost link or a retryable abort
    /// starts a new scan. Returns the state the session settled in.
    pub async fn run(&mut self) -> CentralState {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let state = self.establish().await;
            let rescan = self.config.reconnect == ReconnectPolicy::Rescan;

            match state {
                CentralState::Subscribed => {}
                CentralState::Disconnected if rescan => self.rescan(),
                CentralState::Aborted(reason) if rescan && reason.is_retryable() => self.rescan(),
                _ => return state,
            }

            ticker.tick().await;
        }
    }

    /// Forget the current device and return to `Scanning`.
    pub fn rescan(&mut self) {
        info!("Rescanning for {}", RANGEFINDER_SERVICE_UUID);
        self.session.reset();
        self.link = None;
        if self.config.reset_extrema_on_reconnect {
            self.extrema.lock().reset();
        }
        self.set_state(CentralState::Scanning);
    }

    /// Tear the link down, if any.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(link) = self.link.take() {
            self.transport.disconnect(&link).await?;
        }
        self.session.set_connected(false);
        self.set_state(CentralState::Disconnected);
        Ok(())
    }

    async fn scan(&mut self) {
        info!(
            "Scanning for {} ({:?})",
            RANGEFINDER_SERVICE_UUID, self.config.scan_duration
        );

        match self
            .transport
            .scan(self.config.scan_duration, RANGEFINDER_SERVICE_UUID)
            .await
        {
            Ok(Some(device)) => {
                info!("Found device: {}", device);
                self.session.set_remote(device);
                self.set_state(CentralState::Connecting);
            }
            Ok(None) => {
                warn!("No rangefinder found");
                self.set_state(CentralState::Aborted(AbortReason::NotFound));
            }
            Err(e) => {
                error!("Scan failed: {}", e);
                self.set_state(CentralState::Aborted(AbortReason::Transport));
            }
        }
    }

    async fn connect(&mut self) {
        let Some(device) = self.session.remote().cloned() else {
            self.set_state(CentralState::Aborted(AbortReason::NotFound));
            return;
        };

        match self
            .transport
            .connect(&device, self.disconnect_handler())
            .await
        {
            Ok(link) => {
                info!("Connected to {}", device.display_name());
                self.session.set_connected(true);
                self.link = Some(link);
                self.set_state(CentralState::Resolving);
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", device, e);
                self.set_state(CentralState::Aborted(AbortReason::ConnectFailed));
            }
        }
    }

    async fn resolve(&mut self) {
        let Some(link) = self.link.clone() else {
            self.set_state(CentralState::Aborted(AbortReason::Transport));
            return;
        };

        let service = match self
            .transport
            .resolve_service(&link, RANGEFINDER_SERVICE_UUID)
            .await
        {
            Ok(Some(service)) => service,
            Ok(None) => {
                error!("Failed to find service UUID: {}", RANGEFINDER_SERVICE_UUID);
                return self.abort(AbortReason::ServiceNotFound).await;
            }
            Err(e) => {
                error!("Service lookup failed: {}", e);
                return self.transport_failed().await;
            }
        };

        let characteristic = match self
            .transport
            .resolve_characteristic(&service, DISTANCE_CHARACTERISTIC_UUID)
            .await
        {
            Ok(Some(characteristic)) => characteristic,
            Ok(None) => {
                error!(
                    "Failed to find characteristic UUID: {}",
                    DISTANCE_CHARACTERISTIC_UUID
                );
                return self.abort(AbortReason::CharacteristicNotFound).await;
            }
            Err(e) => {
                error!("Characteristic lookup failed: {}", e);
                return self.transport_failed().await;
            }
        };

        if characteristic.can_read() {
            match self.transport.read_once(&characteristic).await {
                Ok(value) => info!(
                    "The characteristic value was: {}",
                    String::from_utf8_lossy(&value)
                ),
                Err(e) => warn!("Initial read failed: {}", e),
            }
        }

        if characteristic.can_notify() {
            if let Err(e) = self
                .transport
                .subscribe(&characteristic, self.notify_handler())
                .await
            {
                error!("Failed to subscribe: {}", e);
                return self.transport_failed().await;
            }
        }

        // the link may have dropped while subscribing
        if self.session.is_connected() {
            info!("Subscribed to {}", DISTANCE_CHARACTERISTIC_UUID);
            self.set_state(CentralState::Subscribed);
        } else {
            self.set_state(CentralState::Disconnected);
        }
    }

    /// A transport error mid-resolve is link loss if the flag already dropped.
    async fn transport_failed(&mut self) {
        if self.session.is_connected() {
            return self.abort(AbortReason::Transport).await;
        }

        info!("Link lost while resolving");
        self.link = None;
        self.set_state(CentralState::Disconnected);
    }

    async fn abort(&mut self, reason: AbortReason) {
        if let Some(link) = self.link.take() {
            if let Err(e) = self.transport.disconnect(&link).await {
                debug!("Disconnect after abort failed: {}", e);
            }
        }
        self.session.set_connected(false);
        self.set_state(CentralState::Aborted(reason));
    }

    fn disconnect_handler(&self) -> LinkHandler {
        let connected = self.session.connected_flag();
        let state = self.state.clone();

        Arc::new(move || {
            connected.store(false, std::sync::atomic::Ordering::SeqCst);
            let mut state = state.write();
            if *state == CentralState::Subscribed {
                *state = CentralState::Disconnected;
            }
            drop(state);
            info!("Disconnected from rangefinder");
        })
    }

    fn notify_handler(&self) -> NotifyHandler {
        let extrema = self.extrema.clone();
        let readings_tx = self.readings_tx.clone();
        let policy = self.config.malformed_frames;

        Arc::new(move |payload: &[u8]| {
            let distance_cm = match decode_distance(payload) {
                Ok(distance) => distance,
                Err(e) => match policy {
                    MalformedFramePolicy::Skip => {
                        warn!("Dropping notification: {}", e);
                        return;
                    }
                    MalformedFramePolicy::TreatAsZero => {
                        debug!("Recording malformed notification as 0 cm: {}", e);
                        0.0
                    }
                },
            };

            let snapshot = {
                let mut tracker = extrema.lock();
                tracker.update(distance_cm);
                tracker.snapshot()
            };

            info!(
                "Distance: {:.2} cm, max: {:.2} cm, min: {:.2} cm",
                distance_cm, snapshot.max, snapshot.min
            );

            let _ = readings_tx.send(Reading {
                distance_cm,
                extrema: snapshot,
                received_at: Utc::now(),
            });
        })
    }
}

impl<T: CentralTransport> std::fmt::Debug for CentralSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CentralSession")
            .field("state", &self.state())
            .field("link", &self.link)
            .field("extrema", &self.extrema())
            .finish()
    }
}
