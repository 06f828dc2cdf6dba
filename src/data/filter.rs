//! Moving-average smoothing of raw distance samples.

use crate::error::{Error, Result};

/// Default number of samples averaged by the peripheral.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Fixed-window moving average over the most recent samples.
///
/// The window starts filled with zeros and the output is always
/// `sum / window`, so the first `window - 1` outputs ramp up from zero.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    /// Ring buffer of the last `window` samples.
    readings: Box<[f32]>,
    /// Slot the next sample overwrites.
    index: usize,
    /// Running sum of `readings`.
    total: f64,
    /// Samples ingested so far, saturating at the window size.
    filled: usize,
}

impl MovingAverage {
    /// Create a filter averaging over `window` samples.
    ///
    /// # Errors
    ///
    /// Returns an error if `window` is zero.
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(Error::InvalidParameter {
                name: "window_size".to_string(),
                value: window.to_string(),
            });
        }

        Ok(Self {
            readings: vec![0.0; window].into_boxed_slice(),
            index: 0,
            total: 0.0,
            filled: 0,
        })
    }

    /// Push a raw sample and return the new average.
    pub fn ingest(&mut self, raw: f32) -> f32 {
        self.total -= f64::from(self.readings[self.index]);
        self.readings[self.index] = raw;
        self.total += f64::from(raw);
        self.index = (self.index + 1) % self.readings.len();
        if self.filled < self.readings.len() {
            self.filled += 1;
        }
        self.average()
    }

    /// Current average over the whole window.
    pub fn average(&self) -> f32 {
        (self.total / self.readings.len() as f64) as f32
    }

    /// Number of samples in the window.
    pub fn window(&self) -> usize {
        self.readings.len()
    }

    /// Whether every slot has received a real sample.
    pub fn is_filled(&self) -> bool {
        self.filled == self.readings.len()
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self {
            readings: vec![0.0; DEFAULT_WINDOW_SIZE].into_boxed_slice(),
            index: 0,
            total: 0.0,
            filled: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_window_rejected() {
        assert!(MovingAverage::new(0).is_err());
    }

    #[test]
    fn test_ramp_up_from_zero() {
        let mut filter = MovingAverage::default();
        assert!((filter.ingest(20.0) - 2.0).abs() < 1e-6);
        assert!((filter.ingest(20.0) - 4.0).abs() < 1e-6);
        assert!(!filter.is_filled());
    }

    #[test]
    fn test_steady_input() {
        let mut filter = MovingAverage::default();
        let mut out = 0.0;
        for _ in 0..10 {
            out = filter.ingest(25.0);
        }
        assert!(filter.is_filled());
        assert!((out - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_oldest_sample_evicted() {
        let mut filter = MovingAverage::new(3).unwrap();
        filter.ingest(3.0);
        filter.ingest(6.0);
        filter.ingest(9.0);
        assert!((filter.average() - 6.0).abs() < 1e-6);

        // 3.0 drops out
        assert!((filter.ingest(12.0) - 9.0).abs() < 1e-6);
        assert_eq!(filter.window(), 3);
    }

    proptest! {
        #[test]
        fn output_is_mean_of_last_window(samples in proptest::collection::vec(0.0f32..400.0, 10..200)) {
            let mut filter = MovingAverage::default();
            let mut out = 0.0;
            for &s in &samples {
                out = filter.ingest(s);
            }

            let tail = &samples[samples.len() - DEFAULT_WINDOW_SIZE..];
            let expected = tail.iter().map(|&v| f64::from(v)).sum::<f64>() / DEFAULT_WINDOW_SIZE as f64;
            prop_assert!((f64::from(out) - expected).abs() < 1e-3);
        }
    }
}
