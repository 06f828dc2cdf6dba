//! BLE Service and Characteristic UUIDs.
//!
//! The two identifiers both nodes rendezvous on.

use uuid::Uuid;

/// Rangefinder service UUID, advertised by the peripheral.
pub const RANGEFINDER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xdb0e37aa_c7ff_4584_936d_e39622848d33);

/// Distance characteristic UUID (Read, Write, Notify).
pub const DISTANCE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0fd8fa9f_34da_40bb_8cb7_afc7d0174389);

/// Check if a service UUID is the rangefinder service.
pub fn is_rangefinder_service(uuid: &Uuid) -> bool {
    *uuid == RANGEFINDER_SERVICE_UUID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            RANGEFINDER_SERVICE_UUID.to_string(),
            "db0e37aa-c7ff-4584-936d-e39622848d33"
        );
        assert_eq!(
            DISTANCE_CHARACTERISTIC_UUID.to_string(),
            "0fd8fa9f-34da-40bb-8cb7-afc7d0174389"
        );
    }

    #[test]
    fn test_is_rangefinder_service() {
        assert!(is_rangefinder_service(&RANGEFINDER_SERVICE_UUID));
        assert!(!is_rangefinder_service(&DISTANCE_CHARACTERISTIC_UUID));
    }
}
