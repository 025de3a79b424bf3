//! Tests for the checksum engine
//!
//! These tests verify:
//! - CRC-8/0x31 against the check value and real sensor payloads
//! - Nibble-XOR over ASCII bodies
//! - The zero-placeholder convention of the cover checksum

use culbridge::checksum::{crc8, nibble_xor, CRC8_POLY};
use culbridge::protocol::cover;

// =============================================================================
// CRC-8 Tests
// =============================================================================

#[test]
fn test_crc8_empty_is_initial_value() {
    assert_eq!(crc8(&[]), 0x00);
}

#[test]
fn test_crc8_single_bit_yields_polynomial() {
    assert_eq!(crc8(&[0x01]), CRC8_POLY);
}

#[test]
fn test_crc8_check_value() {
    assert_eq!(crc8(b"123456789"), 0xA2);
}

#[test]
fn test_crc8_sensor_payloads() {
    assert_eq!(crc8(&[0x9E, 0xC6, 0x15, 0x41]), 0x4B);
    assert_eq!(crc8(&[0x99, 0x86, 0x37, 0x3F]), 0xC9);
    assert_eq!(crc8(&[0x99, 0x86, 0x37, 0x3E]), 0xF8);
    assert_eq!(crc8(&[0x99, 0xE6, 0x28, 0x2E]), 0xC7);
}

// =============================================================================
// Nibble XOR Tests
// =============================================================================

#[test]
fn test_nibble_xor_fits_in_four_bits() {
    for byte in 0..=u8::MAX {
        assert!(nibble_xor(&[byte]) <= 0x0F);
    }
}

#[test]
fn test_nibble_xor_folds_both_nibbles() {
    // 0x3A: 0xA ^ 0x3
    assert_eq!(nibble_xor(&[0x3A]), 0x9);
    assert_eq!(nibble_xor(b"00"), 0x0);
}

#[test]
fn test_nibble_xor_known_body() {
    assert_eq!(nibble_xor(b"A7201234ABCDEF"), 0x0);
}

// =============================================================================
// Cover Checksum Placeholder Tests
// =============================================================================

#[test]
fn test_cover_checksum_ignores_placeholder_value() {
    let base = *b"A7201234ABCDEF";
    let expected = cover::checksum(&base);

    for digit in b"0123456789ABCDEF" {
        let mut body = base;
        body[cover::CHECKSUM_INDEX] = *digit;
        assert_eq!(cover::checksum(&body), expected, "placeholder {}", *digit as char);
    }
}

#[test]
fn test_cover_checksum_of_encoded_body_is_stable() {
    // Re-checksumming a finished body gives the digit already in it
    let body = b"A38D002AC0FFEE";
    assert_eq!(cover::checksum(body), 0xD);
}
