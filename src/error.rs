//! Error types for the rangefinder-link crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// Operation requires a connection but the link is down.
    #[error("Not connected")]
    NotConnected,

    /// Failed to establish a connection to the peripheral.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// A received frame did not have the `Distance: <value> cm` shape.
    #[error("Malformed frame: {context}")]
    MalformedFrame {
        /// Description of what was wrong with the frame.
        context: String,
    },

    /// The range sensor could not produce a sample.
    #[error("Sensor error: {reason}")]
    Sensor {
        /// Description of the sensor failure.
        reason: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },
}

impl Error {
    pub(crate) fn malformed(context: impl Into<String>) -> Self {
        Self::MalformedFrame {
            context: context.into(),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::malformed("no delimiter");
        assert_eq!(err.to_string(), "Malformed frame: no delimiter");

        let err = Error::InvalidParameter {
            name: "window_size".to_string(),
            value: "0".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid parameter: window_size = 0");

        let err = Error::CharacteristicNotFound {
            uuid: "0fd8fa9f-34da-40bb-8cb7-afc7d0174389".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Characteristic not found: 0fd8fa9f-34da-40bb-8cb7-afc7d0174389"
        );
    }
}
