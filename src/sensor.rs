//! Range sensor capability.
//!
//! The peripheral only needs "give me one echo pulse width". Pin handling
//! and trigger timing live in whatever implements [`RangeSensor`].

use std::time::Duration;

use crate::error::{Error, Result};
use crate::utils::{centimeters_to_pulse, pulse_to_centimeters};

/// A time-of-flight distance sensor.
pub trait RangeSensor: Send {
    /// Trigger one measurement and return the echo pulse width.
    fn measure_pulse(&mut self) -> Result<Duration>;

    /// Trigger one measurement and convert it to centimeters.
    fn measure_centimeters(&mut self) -> Result<f32> {
        self.measure_pulse().map(pulse_to_centimeters)
    }
}

/// Replays a fixed sequence of pulses, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ReplaySensor {
    pulses: Vec<Duration>,
    cursor: usize,
}

impl ReplaySensor {
    /// Replay the given pulse widths.
    pub fn new(pulses: Vec<Duration>) -> Self {
        Self { pulses, cursor: 0 }
    }

    /// Replay pulses that correspond to the given distances.
    pub fn from_centimeters(distances: &[f32]) -> Self {
        Self::new(distances.iter().map(|&d| centimeters_to_pulse(d)).collect())
    }

    /// Number of pulses in one cycle.
    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    /// Check if there is nothing to replay.
    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }
}

impl RangeSensor for ReplaySensor {
    fn measure_pulse(&mut self) -> Result<Duration> {
        if self.pulses.is_empty() {
            return Err(Error::Sensor {
                reason: "no pulses to replay".to_string(),
            });
        }

        let pulse = self.pulses[self.cursor];
        self.cursor = (self.cursor + 1) % self.pulses.len();
        Ok(pulse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_wraps() {
        let mut sensor = ReplaySensor::new(vec![
            Duration::from_micros(100),
            Duration::from_micros(200),
        ]);
        assert_eq!(sensor.measure_pulse().unwrap(), Duration::from_micros(100));
        assert_eq!(sensor.measure_pulse().unwrap(), Duration::from_micros(200));
        assert_eq!(sensor.measure_pulse().unwrap(), Duration::from_micros(100));
    }

    #[test]
    fn test_replay_centimeters() {
        let mut sensor = ReplaySensor::from_centimeters(&[17.0]);
        assert!((sensor.measure_centimeters().unwrap() - 17.0).abs() < 0.001);
    }

    #[test]
    fn test_empty_replay_errors() {
        let mut sensor = ReplaySensor::new(Vec::new());
        assert!(sensor.is_empty());
        assert!(matches!(sensor.measure_pulse(), Err(Error::Sensor { .. })));
    }
}
