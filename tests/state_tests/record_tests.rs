//! Tests for CoverDeviceState
//!
//! These tests verify:
//! - Lock-step advance of rolling code and key nibble
//! - Wraparound of both counters
//! - The JSON record format

use culbridge::state::{
    next_key_nibble, next_rolling_code, parse_address, CoverDeviceState, KEY_MODULUS,
    ROLLING_CODE_MODULUS,
};
use culbridge::BridgeError;

// =============================================================================
// Advance Tests
// =============================================================================

#[test]
fn test_advance_moves_both_counters() {
    let state = CoverDeviceState::new(0xABCDEF, "Kitchen");
    let next = state.advanced();

    assert_eq!(next.rolling_code, 1);
    assert_eq!(next.encryption_key_nibble, 1);
    assert_eq!(next.display_name, "Kitchen");
}

#[test]
fn test_advance_wraps_at_limits() {
    let state = CoverDeviceState {
        encryption_key_nibble: 0xF,
        rolling_code: 0xFF_FFFF,
        ..CoverDeviceState::new(0x000001, "Attic")
    };
    let next = state.advanced();

    assert_eq!(next.rolling_code, 0);
    assert_eq!(next.encryption_key_nibble, 0);
}

#[test]
fn test_rolling_code_full_cycle_returns_to_start() {
    for start in [0u32, 0x1234, 0xFF_FFFF] {
        let mut code = start;
        for _ in 0..ROLLING_CODE_MODULUS {
            code = next_rolling_code(code);
        }
        assert_eq!(code, start);
    }
}

#[test]
fn test_key_nibble_full_cycle_returns_to_start() {
    for start in 0..KEY_MODULUS {
        let mut state = CoverDeviceState {
            encryption_key_nibble: start,
            ..CoverDeviceState::new(0xABCDEF, "Hall")
        };
        for _ in 0..KEY_MODULUS {
            state = state.advanced();
        }
        assert_eq!(state.encryption_key_nibble, start);
        assert_eq!(next_key_nibble(start), (start + 1) % KEY_MODULUS);
    }
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_validate_ranges() {
    assert!(CoverDeviceState::new(0xFF_FFFF, "Max").validate().is_ok());

    let wide_address = CoverDeviceState::new(0x100_0000, "Too wide");
    assert!(matches!(wide_address.validate(), Err(BridgeError::InvalidAddress(_))));

    let wide_key = CoverDeviceState {
        encryption_key_nibble: 0x10,
        ..CoverDeviceState::new(1, "Key")
    };
    assert!(matches!(wide_key.validate(), Err(BridgeError::PersistenceFailure(_))));

    let wide_code = CoverDeviceState {
        rolling_code: ROLLING_CODE_MODULUS,
        ..CoverDeviceState::new(1, "Code")
    };
    assert!(matches!(wide_code.validate(), Err(BridgeError::PersistenceFailure(_))));
}

#[test]
fn test_parse_address() {
    assert_eq!(parse_address("ABCDEF").unwrap(), 0xABCDEF);
    assert_eq!(parse_address("c0ffee").unwrap(), 0xC0FFEE);
    assert!(parse_address("ABCDE").is_err());
    assert!(parse_address("+ABCDE").is_err());
    assert!(parse_address("GHIJKL").is_err());
}

// =============================================================================
// Record Format Tests
// =============================================================================

#[test]
fn test_json_field_names() {
    let state = CoverDeviceState {
        encryption_key_nibble: 7,
        rolling_code: 4660,
        ..CoverDeviceState::new(0xABCDEF, "Living room")
    };
    let value = serde_json::to_value(&state).unwrap();

    assert_eq!(
        value,
        serde_json::json!({
            "address": "ABCDEF",
            "enc_key": 7,
            "rolling_code": 4660,
            "device_class": "shutter",
            "name": "Living room"
        })
    );
}

#[test]
fn test_json_device_class_defaults() {
    let state: CoverDeviceState =
        serde_json::from_str(r#"{"address": "00002A", "enc_key": 1, "rolling_code": 5, "name": "Garage"}"#)
            .unwrap();

    assert_eq!(state.address, 0x2A);
    assert_eq!(state.device_class, "shutter");
}

#[test]
fn test_json_rejects_bad_address() {
    let result: Result<CoverDeviceState, _> =
        serde_json::from_str(r#"{"address": 42, "enc_key": 1, "rolling_code": 5, "name": "Garage"}"#);
    assert!(result.is_err());

    let result: Result<CoverDeviceState, _> =
        serde_json::from_str(r#"{"address": "1234567", "enc_key": 1, "rolling_code": 5, "name": "Garage"}"#);
    assert!(result.is_err());
}
