//! Tests for the LaCrosse IT+ sensor decoder
//!
//! These tests verify:
//! - Field extraction for reference frames
//! - Validity checks in order: length, start marker, CRC
//! - CRC policy (log-only delivers, strict rejects)
//! - Weak-battery source selection
//! - The published JSON body

use culbridge::protocol::sensor::{self, FRAME_LEN};
use culbridge::protocol::{ChecksumStatus, CrcPolicy, SensorReading, WeakBattery};
use culbridge::BridgeError;

// =============================================================================
// Helper Functions
// =============================================================================

fn decode_ok(frame: &str) -> SensorReading {
    let decoded = sensor::decode(frame, CrcPolicy::LogOnly).unwrap();
    assert_eq!(decoded.checksum, ChecksumStatus::Valid, "CRC of {}", frame);
    decoded.reading
}

// =============================================================================
// Reference Frame Tests
// =============================================================================

#[test]
fn test_decode_new_battery_frame() {
    let reading = decode_ok("N0199E6282EC7AAAA0000719199");

    assert_eq!(reading.device_id, 7);
    assert_eq!(reading.battery_percent, 100);
    assert_eq!(reading.temperature_celsius, 22.8);
    assert_eq!(reading.humidity_percent, Some(46));
}

#[test]
fn test_decode_normal_battery_frame() {
    let reading = decode_ok("N019986373FC9AAAA0000000783");

    assert_eq!(reading.device_id, 6);
    assert_eq!(reading.battery_percent, 50);
    assert_eq!(reading.temperature_celsius, 23.7);
    assert_eq!(reading.humidity_percent, Some(63));
}

#[test]
fn test_known_good_frames_have_valid_crc() {
    let frames = [
        ("N019EC615414BAAAA0000571601", 11, 21.5, 65),
        ("N019986373FC9AAAA0000109880", 6, 23.7, 63),
        ("N019986373EF8AAAA000002B204", 6, 23.7, 62),
        ("N019986363E0CAAAA000001A4A0", 6, 23.6, 62),
        ("N019A86414280AAAA0000480473", 10, 24.1, 66),
    ];

    for (frame, id, temperature, humidity) in frames {
        let reading = decode_ok(frame);
        assert_eq!(reading.device_id, id, "{}", frame);
        assert_eq!(reading.temperature_celsius, temperature, "{}", frame);
        assert_eq!(reading.humidity_percent, Some(humidity), "{}", frame);
    }
}

#[test]
fn test_humidity_absent() {
    let reading = decode_ok("N0199E6286A3EAAAA0000000000");

    assert_eq!(reading.device_id, 7);
    assert_eq!(reading.humidity_percent, None);
    assert_eq!(reading.temperature_celsius, 22.8);
}

#[test]
fn test_humidity_high_bit_not_weak_by_default() {
    // id byte carries the new-battery flag, humidity byte has bit 7 set
    let reading = decode_ok("N0199E628AEBDAAAA0000000000");

    assert_eq!(reading.battery_percent, 100);
    assert_eq!(reading.humidity_percent, Some(46));
}

#[test]
fn test_weak_battery_from_humidity_bit7() {
    let decoded = sensor::decode_with(
        "N0199E628AEBDAAAA0000000000",
        CrcPolicy::LogOnly,
        WeakBattery::HumidityBit7,
    )
    .unwrap();

    assert_eq!(decoded.checksum, ChecksumStatus::Valid);
    // weak wins over the new-battery flag
    assert_eq!(decoded.reading.battery_percent, 10);
    assert_eq!(decoded.reading.humidity_percent, Some(46));
}

#[test]
fn test_weak_battery_source_only_matters_with_bit7_set() {
    for source in [WeakBattery::HumidityDigit, WeakBattery::HumidityBit7] {
        let decoded = sensor::decode_with("N0199E6282EC7AAAA0000719199", CrcPolicy::LogOnly, source).unwrap();
        assert_eq!(decoded.reading.battery_percent, 100, "{}", source);
    }
}

#[test]
fn test_weak_battery_parsing() {
    assert_eq!("humidity-digit".parse::<WeakBattery>().unwrap(), WeakBattery::HumidityDigit);
    assert_eq!("Humidity-Bit7".parse::<WeakBattery>().unwrap(), WeakBattery::HumidityBit7);
    assert_eq!(WeakBattery::default(), WeakBattery::HumidityDigit);
    assert!("battery".parse::<WeakBattery>().is_err());
}

#[test]
fn test_negative_temperature() {
    let reading = decode_ok("N0199E3502EA4AAAA0000000000");
    assert_eq!(reading.temperature_celsius, -5.0);
}

// =============================================================================
// Validity Check Tests
// =============================================================================

#[test]
fn test_wrong_length_is_malformed() {
    for frame in ["", "N0199E6282EC7", "N0199E6282EC7AAAA00007191990"] {
        assert!(
            matches!(sensor::decode(frame, CrcPolicy::LogOnly), Err(BridgeError::MalformedFrame(_))),
            "{:?}",
            frame
        );
    }
    assert_eq!("N0199E6282EC7AAAA0000719199".len(), FRAME_LEN);
}

#[test]
fn test_bad_start_marker() {
    let result = sensor::decode("N0189E6282EC7AAAA0000719199", CrcPolicy::LogOnly);
    assert!(matches!(result, Err(BridgeError::BadStartMarker(_))));
}

#[test]
fn test_length_checked_before_marker() {
    let result = sensor::decode("N018", CrcPolicy::LogOnly);
    assert!(matches!(result, Err(BridgeError::MalformedFrame(_))));
}

#[test]
fn test_non_hex_fields_are_malformed() {
    let result = sensor::decode("N0199G6282EC7AAAA0000719199", CrcPolicy::LogOnly);
    assert!(matches!(result, Err(BridgeError::MalformedFrame(_))));
}

// =============================================================================
// CRC Policy Tests
// =============================================================================

#[test]
fn test_crc_mismatch_delivered_under_log_only() {
    let decoded = sensor::decode("N0199E6282E00AAAA0000000000", CrcPolicy::LogOnly).unwrap();

    assert_eq!(
        decoded.checksum,
        ChecksumStatus::Mismatch {
            received: 0x00,
            calculated: 0xC7
        }
    );
    assert_eq!(decoded.reading.device_id, 7);
    assert_eq!(decoded.reading.temperature_celsius, 22.8);
}

#[test]
fn test_crc_mismatch_rejected_under_strict() {
    let result = sensor::decode("N0199E6282E00AAAA0000000000", CrcPolicy::Strict);
    assert!(matches!(
        result,
        Err(BridgeError::ChecksumMismatch {
            received: 0x00,
            calculated: 0xC7
        })
    ));
}

#[test]
fn test_known_bad_frame_is_flagged() {
    assert!(matches!(
        sensor::decode("N019ECE33398CAAAA0000A17C69", CrcPolicy::Strict),
        Err(BridgeError::ChecksumMismatch {
            received: 0x8C,
            calculated: 0xDE
        })
    ));
    // Log-only gets past the CRC but the temperature digits are not decimal
    assert!(matches!(
        sensor::decode("N019ECE33398CAAAA0000A17C69", CrcPolicy::LogOnly),
        Err(BridgeError::MalformedFrame(_))
    ));
}

#[test]
fn test_crc_policy_parsing() {
    assert_eq!("log-only".parse::<CrcPolicy>().unwrap(), CrcPolicy::LogOnly);
    assert_eq!("STRICT".parse::<CrcPolicy>().unwrap(), CrcPolicy::Strict);
    assert!("lenient".parse::<CrcPolicy>().is_err());
}

// =============================================================================
// Payload Tests
// =============================================================================

#[test]
fn test_payload_json() {
    let reading = decode_ok("N0199E6282EC7AAAA0000719199");
    let payload: serde_json::Value = serde_json::from_slice(&reading.to_payload().unwrap()).unwrap();

    assert_eq!(
        payload,
        serde_json::json!({"temperature": 22.8, "humidity": 46, "battery": 100})
    );
}

#[test]
fn test_payload_omits_absent_humidity() {
    let reading = decode_ok("N0199E6286A3EAAAA0000000000");
    let payload: serde_json::Value = serde_json::from_slice(&reading.to_payload().unwrap()).unwrap();

    assert!(payload.get("humidity").is_none());
    assert_eq!(payload["battery"], 100);
}
