//! Tests for the Intertechno switch codec
//!
//! These tests verify:
//! - Exact frame bytes for ON and both OFF variants
//! - Address validation
//! - Round trip of every address through the frame parser

use culbridge::protocol::switch::{self, FRAME_LEN};
use culbridge::protocol::{OffBits, SwitchAction, SwitchCommand};
use culbridge::BridgeError;

// =============================================================================
// Helper Functions
// =============================================================================

/// All 32 codes of 5 symbols over {0, F}
fn all_codes() -> Vec<String> {
    (0u8..32)
        .map(|n| {
            (0..5)
                .map(|bit| if n & (1 << (4 - bit)) != 0 { 'F' } else { '0' })
                .collect()
        })
        .collect()
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_on() {
    let command = SwitchCommand::new("0FFFF", "0FFF0", SwitchAction::On).unwrap();
    let frame = switch::encode(&command, OffBits::ZeroF);

    assert_eq!(frame, b"is0FFFF0FFF0FF\n".to_vec());
    assert_eq!(frame.len(), FRAME_LEN);
}

#[test]
fn test_encode_off_variants() {
    let command = SwitchCommand::new("0FFFF", "0FFF0", SwitchAction::Off).unwrap();

    assert_eq!(switch::encode(&command, OffBits::ZeroF), b"is0FFFF0FFF00F\n".to_vec());
    assert_eq!(switch::encode(&command, OffBits::FZero), b"is0FFFF0FFF0F0\n".to_vec());
}

#[test]
fn test_lowercase_codes_are_normalized() {
    let command = SwitchCommand::new("0ffff", "f0000", SwitchAction::On).unwrap();
    assert_eq!(command.address(), "0FFFFF0000");
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_invalid_codes_rejected() {
    for (system, unit) in [("0FFF", "00000"), ("0FFFF1", "00000"), ("0FFF1", "00000"), ("00000", "ABCDE")] {
        let result = SwitchCommand::new(system, unit, SwitchAction::On);
        assert!(
            matches!(result, Err(BridgeError::InvalidAddress(_))),
            "{}/{} accepted",
            system,
            unit
        );
    }
}

#[test]
fn test_split_address() {
    let (system, unit) = switch::split_address("0fFff0FFF0").unwrap();
    assert_eq!(system, "0FFFF");
    assert_eq!(unit, "0FFF0");

    assert!(matches!(switch::split_address("0FFFF"), Err(BridgeError::InvalidAddress(_))));
    assert!(matches!(switch::split_address("0FFFF0FFF1"), Err(BridgeError::InvalidAddress(_))));
    assert!(matches!(switch::split_address("0FFFF0FFFÄ"), Err(BridgeError::InvalidAddress(_))));
}

#[test]
fn test_payload_parsing() {
    assert_eq!(SwitchAction::from_payload("ON").unwrap(), SwitchAction::On);
    assert_eq!(SwitchAction::from_payload("OFF\n").unwrap(), SwitchAction::Off);
    assert!(matches!(
        SwitchAction::from_payload("TOGGLE"),
        Err(BridgeError::UnsupportedCommand(_))
    ));
}

#[test]
fn test_off_bits_parsing() {
    assert_eq!("0F".parse::<OffBits>().unwrap(), OffBits::ZeroF);
    assert_eq!("f0".parse::<OffBits>().unwrap(), OffBits::FZero);
    assert!("FF".parse::<OffBits>().is_err());
}

// =============================================================================
// Frame Parsing Tests
// =============================================================================

#[test]
fn test_every_address_round_trips() {
    let codes = all_codes();
    assert_eq!(codes.len(), 32);

    for off in [OffBits::ZeroF, OffBits::FZero] {
        for system in &codes {
            for unit in &codes {
                for action in [SwitchAction::On, SwitchAction::Off] {
                    let command = SwitchCommand::new(system, unit, action).unwrap();
                    let frame = switch::encode(&command, off);
                    assert_eq!(switch::decode_frame(&frame, off).unwrap(), command);
                }
            }
        }
    }
}

#[test]
fn test_decode_rejects_foreign_frames() {
    assert!(matches!(
        switch::decode_frame(b"YsA7201234ABCDEF\n", OffBits::ZeroF),
        Err(BridgeError::BadStartMarker(_))
    ));
    assert!(matches!(
        switch::decode_frame(b"is0FFFF\n", OffBits::ZeroF),
        Err(BridgeError::MalformedFrame(_))
    ));
    // F0 is not an OFF under the 0F variant
    assert!(matches!(
        switch::decode_frame(b"is0FFFF0FFF0F0\n", OffBits::ZeroF),
        Err(BridgeError::UnsupportedCommand(_))
    ));
}
