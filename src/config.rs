//! Node configuration.
//!
//! Defaults reproduce the deployed XIAO ESP32-S3 firmware pair.

use std::time::Duration;

use crate::data::filter::DEFAULT_WINDOW_SIZE;
use crate::error::{Error, Result};

/// Advertised name of the rangefinder peripheral.
pub const DEFAULT_DEVICE_NAME: &str = "XIAO_ESP32S3_liliana";

/// Distances at or above this are not published, in centimeters.
pub const DEFAULT_PUBLISH_THRESHOLD_CM: f32 = 30.0;

// ----------------------------------------------------------------------------
// Peripheral
// ----------------------------------------------------------------------------

/// Configuration for the peripheral (sensor) node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeripheralConfig {
    /// Name used in the characteristic's initial value.
    pub device_name: String,
    /// Number of samples in the moving average.
    pub window_size: usize,
    /// Only distances strictly below this are published.
    pub publish_threshold_cm: f32,
    /// Minimum spacing between publishes while connected.
    pub publish_interval: Duration,
    /// Wait after the subscriber leaves before advertising again.
    pub readvertise_delay: Duration,
    /// Spacing between sensor reads in [`run`](crate::peripheral::PeripheralSession::run).
    pub sample_interval: Duration,
    /// Truncate each raw sample to whole centimeters before filtering.
    pub whole_centimeters: bool,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            publish_threshold_cm: DEFAULT_PUBLISH_THRESHOLD_CM,
            publish_interval: Duration::from_millis(1000),
            readvertise_delay: Duration::from_millis(500),
            sample_interval: Duration::from_millis(1000),
            whole_centimeters: true,
        }
    }
}

impl PeripheralConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device name
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Set the moving-average window
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Set the publish threshold
    pub fn with_publish_threshold(mut self, threshold_cm: f32) -> Self {
        self.publish_threshold_cm = threshold_cm;
        self
    }

    /// Set the publish interval
    pub fn with_publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval = interval;
        self
    }

    /// Set the re-advertise delay
    pub fn with_readvertise_delay(mut self, delay: Duration) -> Self {
        self.readvertise_delay = delay;
        self
    }

    /// Set the sample interval
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Enable or disable whole-centimeter truncation
    pub fn with_whole_centimeters(mut self, enabled: bool) -> Self {
        self.whole_centimeters = enabled;
        self
    }

    /// Value the characteristic holds before the first publish.
    pub fn initial_value(&self) -> String {
        format!("Connected! Device name: {}", self.device_name)
    }

    /// Check the settings for values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(invalid("window_size", self.window_size));
        }
        if !self.publish_threshold_cm.is_finite() {
            return Err(invalid("publish_threshold_cm", self.publish_threshold_cm));
        }
        if self.sample_interval.is_zero() {
            return Err(invalid("sample_interval", format!("{:?}", self.sample_interval)));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Central
// ----------------------------------------------------------------------------

/// What the central does once an established link drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReconnectPolicy {
    /// Stay disconnected.
    #[default]
    Never,
    /// Start a new scan.
    Rescan,
}

/// How the central treats a notification that does not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MalformedFramePolicy {
    /// Drop the frame; extrema are untouched.
    #[default]
    Skip,
    /// Record the frame as a 0.0 cm reading.
    TreatAsZero,
}

/// Configuration for the central (observer) node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CentralConfig {
    /// How long one scan may run.
    pub scan_duration: Duration,
    /// Spacing between link checks in [`run`](crate::central::CentralSession::run).
    pub poll_interval: Duration,
    /// Behaviour after link loss.
    pub reconnect: ReconnectPolicy,
    /// Behaviour on undecodable notifications.
    pub malformed_frames: MalformedFramePolicy,
    /// Clear min/max when a rescan starts.
    pub reset_extrema_on_reconnect: bool,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            reconnect: ReconnectPolicy::Never,
            malformed_frames: MalformedFramePolicy::Skip,
            reset_extrema_on_reconnect: false,
        }
    }
}

impl CentralConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan duration
    pub fn with_scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set reconnect policy
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set malformed-frame policy
    pub fn with_malformed_frames(mut self, policy: MalformedFramePolicy) -> Self {
        self.malformed_frames = policy;
        self
    }

    /// Enable or disable per-connection extrema
    pub fn with_reset_extrema_on_reconnect(mut self, enabled: bool) -> Self {
        self.reset_extrema_on_reconnect = enabled;
        self
    }

    /// Check the settings for values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scan_duration.is_zero() {
            return Err(invalid("scan_duration", format!("{:?}", self.scan_duration)));
        }
        if self.poll_interval.is_zero() {
            return Err(invalid("poll_interval", format!("{:?}", self.poll_interval)));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: impl ToString) -> Error {
    Error::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}
