//! Running minimum and maximum of received distances.

/// A min/max pair.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extrema {
    /// Largest distance seen, in centimeters.
    pub max: f32,
    /// Smallest distance seen, in centimeters.
    pub min: f32,
}

/// Tracks the extrema of every distance the central has accepted.
///
/// `max` only grows and `min` only shrinks. Before the first update they sit
/// at `f32::MIN` and `f32::MAX` respectively.
#[derive(Debug, Clone)]
pub struct ExtremaTracker {
    max: f32,
    min: f32,
    count: u64,
}

impl ExtremaTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            max: f32::MIN,
            min: f32::MAX,
            count: 0,
        }
    }

    /// Fold a distance into the extrema.
    pub fn update(&mut self, value: f32) {
        if value > self.max {
            self.max = value;
        }
        if value < self.min {
            self.min = value;
        }
        self.count += 1;
    }

    /// Largest distance seen.
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Smallest distance seen.
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Number of updates applied.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether no value has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Copy of the current extrema.
    pub fn snapshot(&self) -> Extrema {
        Extrema {
            max: self.max,
            min: self.min,
        }
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ExtremaTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_initial_bounds() {
        let tracker = ExtremaTracker::new();
        assert_eq!(tracker.max(), f32::MIN);
        assert_eq!(tracker.min(), f32::MAX);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_sequence() {
        let mut tracker = ExtremaTracker::new();
        for v in [20.0, 5.0, 40.0, 5.0] {
            tracker.update(v);
        }
        assert_eq!(tracker.snapshot(), Extrema { max: 40.0, min: 5.0 });
        assert_eq!(tracker.count(), 4);
    }

    #[test]
    fn test_reset() {
        let mut tracker = ExtremaTracker::new();
        tracker.update(12.0);
        tracker.reset();
        assert!(tracker.is_empty());
        assert_eq!(tracker.max(), f32::MIN);
    }

    proptest! {
        #[test]
        fn extrema_are_monotone(values in proptest::collection::vec(0.0f32..500.0, 1..100)) {
            let mut tracker = ExtremaTracker::new();
            let mut prev = tracker.snapshot();
            for v in values {
                tracker.update(v);
                let now = tracker.snapshot();
                prop_assert!(now.max >= prev.max);
                prop_assert!(now.min <= prev.min);
                prev = now;
            }
        }
    }
}
