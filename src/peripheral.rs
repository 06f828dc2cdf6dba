//! Peripheral (sensor node) session.
//!
//! Owns the moving-average filter and decides when a reading goes out. The
//! loop is driven by [`PeripheralSession::tick`] with an explicit monotonic
//! timestamp, so cadence and the re-advertise delay can be exercised
//! without sleeping.
//!
//! ```text
//!   Idle --start()--> Advertising --attach--> Connected
//!    ^                                           |
//!    +---------------- detach -------------------+
//!   Idle --(readvertise_delay elapsed)--> Advertising
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::ble::transport::PeripheralTransport;
use crate::ble::uuids::{DISTANCE_CHARACTERISTIC_UUID, RANGEFINDER_SERVICE_UUID};
use crate::config::PeripheralConfig;
use crate::data::{LinkEdge, MovingAverage, Session};
use crate::error::Result;
use crate::protocol::encode_distance;
use crate::sensor::RangeSensor;

/// Advertising/connection state of the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PeripheralState {
    /// Not discoverable: before `start()`, or waiting out the re-advertise delay.
    #[default]
    Idle,
    /// Discoverable, no subscriber.
    Advertising,
    /// A central is subscribed.
    Connected,
}

impl std::fmt::Display for PeripheralState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Advertising => write!(f, "Advertising"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// The sensor node's side of the link.
pub struct PeripheralSession<T: PeripheralTransport> {
    transport: Arc<T>,
    config: PeripheralConfig,
    filter: MovingAverage,
    session: Session,
    state: PeripheralState,
    /// When the last publish slot was used, published or not.
    last_publish: Option<Instant>,
    /// When the subscriber was seen leaving; cleared once advertising restarts.
    detached_at: Option<Instant>,
    published: u64,
}

impl<T: PeripheralTransport> PeripheralSession<T> {
    /// Create a session over `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(transport: Arc<T>, config: PeripheralConfig) -> Result<Self> {
        config.validate()?;
        let filter = MovingAverage::new(config.window_size)?;

        Ok(Self {
            transport,
            config,
            filter,
            session: Session::new(),
            state: PeripheralState::Idle,
            last_publish: None,
            detached_at: None,
            published: 0,
        })
    }

    /// Get the current state.
    pub fn state(&self) -> PeripheralState {
        self.state
    }

    /// Get the configuration.
    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    /// Check if a subscriber is attached right now.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Latest filter output.
    pub fn filtered_distance(&self) -> f32 {
        self.filter.average()
    }

    /// Number of frames handed to the transport.
    pub fn published_count(&self) -> u64 {
        self.published
    }

    /// Install callbacks, expose the characteristic and start advertising.
    pub async fn start(&mut self) -> Result<()> {
        let attached = self.session.connected_flag();
        let detached = self.session.connected_flag();
        self.transport.set_subscriber_handlers(
            Arc::new(move || attached.store(true, Ordering::SeqCst)),
            Arc::new(move || detached.store(false, Ordering::SeqCst)),
        );

        self.transport
            .register_service(
                RANGEFINDER_SERVICE_UUID,
                DISTANCE_CHARACTERISTIC_UUID,
                self.config.initial_value().as_bytes(),
            )
            .await?;

        self.transport
            .start_advertising(RANGEFINDER_SERVICE_UUID)
            .await?;

        self.state = PeripheralState::Advertising;
        info!(
            "Characteristic defined, advertising as {}",
            self.config.device_name
        );

        Ok(())
    }

    /// Feed one raw sample through the filter.
    pub fn ingest(&mut self, raw_cm: f32) -> f32 {
        let raw = if self.config.whole_centimeters {
            raw_cm.trunc()
        } else {
            raw_cm
        };

        let filtered = self.filter.ingest(raw);
        debug!(
            "Raw distance: {} cm, filtered distance: {:.2} cm",
            raw, filtered
        );
        filtered
    }

    /// Observe subscriber changes and restart advertising once the delay
    /// after a detach has passed.
    pub async fn poll_link(&mut self, now: Instant) {
        match self.session.poll_edge() {
            Some(LinkEdge::Attached) => {
                info!("Subscriber attached");
                self.state = PeripheralState::Connected;
                self.detached_at = None;
            }
            Some(LinkEdge::Detached) => {
                info!(
                    "Subscriber detached, advertising again in {:?}",
                    self.config.readvertise_delay
                );
                self.state = PeripheralState::Idle;
                self.detached_at = Some(now);
            }
            None => {}
        }

        let Some(since) = self.detached_at else {
            return;
        };

        if now.saturating_duration_since(since) < self.config.readvertise_delay {
            return;
        }

        match self
            .transport
            .start_advertising(RANGEFINDER_SERVICE_UUID)
            .await
        {
            Ok(()) => {
                info!("Start advertising");
                self.detached_at = None;
                self.state = PeripheralState::Advertising;
            }
            // detached_at is kept so the next tick retries
            Err(e) => warn!("Failed to restart advertising: {}", e),
        }
    }

    /// Run one loop step with an already filtered value.
    ///
    /// Returns the frame if one was handed to the transport.
    pub async fn tick(&mut self, now: Instant, filtered: f32) -> Option<String> {
        self.poll_link(now).await;

        if self.state != PeripheralState::Connected {
            return None;
        }

        let due = self
            .last_publish
            .map_or(true, |last| {
                now.saturating_duration_since(last) >= self.config.publish_interval
            });
        if !due {
            return None;
        }
        self.last_publish = Some(now);

        if filtered.is_nan() || filtered >= self.config.publish_threshold_cm {
            debug!(
                "Filtered distance {:.2} cm not below {} cm, not published",
                filtered, self.config.publish_threshold_cm
            );
            return None;
        }

        let frame = encode_distance(filtered);
        if let Err(e) = self
            .transport
            .publish(DISTANCE_CHARACTERISTIC_UUID, frame.as_bytes())
            .await
        {
            debug!("Notify failed: {}", e);
        }
        self.published += 1;
        info!("Notify value: {}", frame);

        Some(frame)
    }

    /// Filter a raw sample and run one loop step with the result.
    pub async fn sample_and_tick(&mut self, now: Instant, raw_cm: f32) -> Option<String> {
        let filtered = self.ingest(raw_cm);
        self.tick(now, filtered).await
    }

    /// Start the session and sample `sensor` every `sample_interval`
    /// forever. Only returns if startup fails.
    pub async fn run<S: RangeSensor>(&mut self, sensor: &mut S) -> Result<()> {
        self.start().await?;

        let mut ticker = tokio::time::interval(self.config.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let now = Instant::now();

            match sensor.measure_centimeters() {
                Ok(raw_cm) => {
                    self.sample_and_tick(now, raw_cm).await;
                }
                Err(e) => {
                    warn!("Sensor read failed: {}", e);
                    self.poll_link(now).await;
                }
            }
        }
    }
}

impl<T: PeripheralTransport> std::fmt::Debug for PeripheralSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeripheralSession")
            .field("state", &self.state)
            .field("filtered", &self.filter.average())
            .field("published", &self.published)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::loopback::Loopback;
    use crate::sensor::ReplaySensor;
    use bytes::Bytes;
    use std::time::Duration;

    async fn started() -> (Arc<Loopback>, PeripheralSession<Loopback>) {
        let loopback = Arc::new(Loopback::new());
        let mut session =
            PeripheralSession::new(loopback.clone(), PeripheralConfig::default()).unwrap();
        session.start().await.unwrap();
        (loopback, session)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let loopback = Arc::new(Loopback::new());
        let config = PeripheralConfig::default().with_window_size(0);
        assert!(PeripheralSession::new(loopback, config).is_err());
    }

    #[tokio::test]
    async fn test_start_advertises_with_initial_value() {
        let (loopback, session) = started().await;
        assert_eq!(session.state(), PeripheralState::Advertising);
        assert!(loopback.is_advertising());
        assert_eq!(
            loopback.value().unwrap(),
            Bytes::from_static(b"Connected! Device name: XIAO_ESP32S3_liliana")
        );
    }

    #[tokio::test]
    async fn test_nothing_published_without_subscriber() {
        let (loopback, mut session) = started().await;
        assert_eq!(session.tick(Instant::now(), 10.0).await, None);
        assert!(loopback.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_threshold() {
        let (loopback, mut session) = started().await;
        loopback.attach();

        let t0 = Instant::now();
        let second = Duration::from_millis(1000);
        assert_eq!(session.tick(t0, 31.0).await, None);
        assert_eq!(session.state(), PeripheralState::Connected);
        assert_eq!(
            session.tick(t0 + second, 29.9).await.as_deref(),
            Some("Distance: 29.90 cm")
        );
        assert_eq!(
            session.tick(t0 + second * 2, 15.0).await.as_deref(),
            Some("Distance: 15.00 cm")
        );

        assert_eq!(loopback.published().len(), 2);
        assert_eq!(session.published_count(), 2);
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let (loopback, mut session) = started().await;
        loopback.attach();
        assert_eq!(session.tick(Instant::now(), 30.0).await, None);
        assert!(loopback.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_cadence() {
        let (loopback, mut session) = started().await;
        loopback.attach();

        let t0 = Instant::now();
        assert!(session.tick(t0, 10.0).await.is_some());
        assert!(session
            .tick(t0 + Duration::from_millis(500), 10.0)
            .await
            .is_none());
        assert!(session
            .tick(t0 + Duration::from_millis(999), 10.0)
            .await
            .is_none());
        assert!(session
            .tick(t0 + Duration::from_millis(1000), 10.0)
            .await
            .is_some());
        assert_eq!(loopback.published().len(), 2);
    }

    #[tokio::test]
    async fn test_readvertise_after_delay() {
        let (loopback, mut session) = started().await;
        loopback.attach();

        let t0 = Instant::now();
        session.tick(t0, 40.0).await;
        assert_eq!(session.state(), PeripheralState::Connected);
        assert_eq!(loopback.advertise_count(), 1);

        loopback.sever();
        let detached = t0 + Duration::from_millis(100);
        session.poll_link(detached).await;
        assert_eq!(session.state(), PeripheralState::Idle);

        session.poll_link(detached + Duration::from_millis(499)).await;
        assert_eq!(session.state(), PeripheralState::Idle);
        assert!(!loopback.is_advertising());
        assert_eq!(loopback.advertise_count(), 1);

        session.poll_link(detached + Duration::from_millis(500)).await;
        assert_eq!(session.state(), PeripheralState::Advertising);
        assert!(loopback.is_advertising());
        assert_eq!(loopback.advertise_count(), 2);
    }

    #[tokio::test]
    async fn test_reattach_during_delay_cancels_readvertise() {
        let (loopback, mut session) = started().await;
        loopback.attach();

        let t0 = Instant::now();
        session.poll_link(t0).await;
        loopback.sever();
        session.poll_link(t0 + Duration::from_millis(10)).await;
        loopback.attach();
        session.poll_link(t0 + Duration::from_millis(20)).await;
        assert_eq!(session.state(), PeripheralState::Connected);

        session.poll_link(t0 + Duration::from_secs(2)).await;
        assert_eq!(session.state(), PeripheralState::Connected);
        assert_eq!(loopback.advertise_count(), 1);
    }

    #[test]
    fn test_ingest_truncates_to_whole_centimeters() {
        let loopback = Arc::new(Loopback::new());
        let mut session = PeripheralSession::new(loopback.clone(), PeripheralConfig::default())
            .unwrap();
        assert!((session.ingest(25.9) - 2.5).abs() < 1e-6);

        let config = PeripheralConfig::default().with_whole_centimeters(false);
        let mut session = PeripheralSession::new(loopback, config).unwrap();
        assert!((session.ingest(25.9) - 2.59).abs() < 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_publishes_once_attached() {
        let loopback = Arc::new(Loopback::new());
        let config = PeripheralConfig::default().with_sample_interval(Duration::from_millis(5));
        let mut session = PeripheralSession::new(loopback.clone(), config).unwrap();
        let mut sensor = ReplaySensor::from_centimeters(&[12.0]);

        let remote = loopback.clone();
        let subscriber = async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.attach();
            tokio::time::sleep(Duration::from_millis(100)).await;
        };

        tokio::select! {
            result = session.run(&mut sensor) => panic!("run returned: {:?}", result),
            _ = subscriber => {}
        }

        assert_eq!(session.state(), PeripheralState::Connected);
        assert!(!loopback.published().is_empty());
    }
}
