//! Distance frame encoding and decoding.
//!
//! A frame is the plain text `Distance: <value> cm`, where `<value>` is the
//! filtered distance rendered with two decimals. The value is located by
//! position rather than by prefix: it is whatever sits between the first
//! space and the next space after it.

use crate::error::{Error, Result};

/// Text that precedes the value in a frame.
pub const FRAME_PREFIX: &str = "Distance: ";

/// Text that follows the value in a frame.
pub const FRAME_SUFFIX: &str = " cm";

/// Encode a filtered distance as a wire frame.
///
/// # Example
///
/// ```
/// use rangefinder_link::protocol::encode_distance;
///
/// assert_eq!(encode_distance(23.4), "Distance: 23.40 cm");
/// ```
pub fn encode_distance(distance_cm: f32) -> String {
    format!("{}{:.2}{}", FRAME_PREFIX, distance_cm, FRAME_SUFFIX)
}

/// Decode a wire frame back into a distance.
///
/// # Errors
///
/// Returns [`Error::MalformedFrame`] if either space delimiter is missing,
/// the value is not valid UTF-8, or it does not parse as a finite number.
pub fn decode_distance(frame: &[u8]) -> Result<f32> {
    let start = frame
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::malformed("missing first delimiter"))?
        + 1;

    let len = frame[start..]
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::malformed("missing second delimiter"))?;

    let token = std::str::from_utf8(&frame[start..start + len])
        .map_err(|_| Error::malformed("value is not valid UTF-8"))?;

    let value: f32 = token
        .parse()
        .map_err(|_| Error::malformed(format!("value {:?} is not a number", token)))?;

    if !value.is_finite() {
        return Err(Error::malformed(format!("value {:?} is not finite", token)));
    }

    Ok(value)
}

/// Decode a wire frame, yielding `0.0` for anything malformed.
///
/// Firmware-era centrals parse this way. A zero from here cannot be told
/// apart from a genuine zero reading.
pub fn decode_distance_lossy(frame: &[u8]) -> f32 {
    decode_distance(frame).unwrap_or(0.0)
}
