//! Utility functions for the rangefinder-link crate.

use std::time::Duration;

/// Speed of sound used for time-of-flight conversion, in cm/µs.
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.034;

/// Convert an echo pulse width to a distance.
///
/// The pulse covers the round trip, so the one-way distance is half of
/// `duration * speed`.
///
/// # Example
///
/// ```
/// use rangefinder_link::pulse_to_centimeters;
/// use std::time::Duration;
///
/// let cm = pulse_to_centimeters(Duration::from_micros(1470));
/// assert!((cm - 24.99).abs() < 0.001);
/// ```
#[inline]
pub fn pulse_to_centimeters(pulse: Duration) -> f32 {
    pulse.as_micros() as f32 * SPEED_OF_SOUND_CM_PER_US / 2.0
}

/// Convert a distance to the echo pulse width that would produce it.
///
/// Rounded to the nearest microsecond.
#[inline]
pub fn centimeters_to_pulse(distance_cm: f32) -> Duration {
    let micros = (distance_cm.max(0.0) * 2.0 / SPEED_OF_SOUND_CM_PER_US).round();
    Duration::from_micros(micros as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_to_centimeters() {
        assert_eq!(pulse_to_centimeters(Duration::ZERO), 0.0);
        assert!((pulse_to_centimeters(Duration::from_micros(1000)) - 17.0).abs() < 0.001);
        assert!((pulse_to_centimeters(Duration::from_millis(1)) - 17.0).abs() < 0.001);
    }

    #[test]
    fn test_centimeters_to_pulse() {
        assert_eq!(centimeters_to_pulse(17.0), Duration::from_micros(1000));
        assert_eq!(centimeters_to_pulse(-3.0), Duration::ZERO);
    }

    #[test]
    fn test_distance_roundtrip() {
        let original = 25.0;
        let converted = pulse_to_centimeters(centimeters_to_pulse(original));
        assert!((converted - original).abs() < 0.02);
    }
}
