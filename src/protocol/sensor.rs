//! LaCrosse IT+ sensor decoder
//!
//! Receive-only telemetry. culfw reports each beacon in native RF mode 1 as
//! a 27-character line:
//!
//! ```text
//! N01 9 9E 628 2E C7 AAAA0000719199
//!  │  │ │  │   │  │  └─ trailer (ignored)
//!  │  │ │  │   │  └──── CRC-8 over "99E6282E" as bytes
//!  │  │ │  │   └─────── humidity byte (low 7 bits = %rH)
//!  │  │ │  └─────────── temperature, 3 decimal digits, tenths + 40 °C
//!  │  │ └────────────── id byte (bits 5..2 = id, bit 1 = new battery)
//!  │  └──────────────── start marker
//!  └─────────────────── culfw native mode prefix
//! ```

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::Serialize;

use crate::checksum::crc8;
use crate::error::{BridgeError, Result};

/// Prefix culfw puts in front of native-mode-1 reports
pub const FRAME_MARKER: &str = "N01";

/// Exact length of a report line (newline stripped)
pub const FRAME_LEN: usize = 27;

/// Command switching the transceiver to native RF receive mode 1
pub const LISTEN_COMMAND: &[u8] = b"Nr1\n";

/// Humidity value reported by sensors without a humidity element
pub const NO_HUMIDITY: u8 = 106;

const START_MARKER_POS: usize = 3;
const START_MARKER: u8 = b'9';
const ID: Range<usize> = 4..6;
const TEMPERATURE: Range<usize> = 6..9;
const HUMIDITY: Range<usize> = 9..11;
const CRC_PAYLOAD: Range<usize> = 3..11;
const CRC: Range<usize> = 11..13;

/// What to do when the received CRC disagrees with the computed one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcPolicy {
    /// Log the mismatch and deliver the reading anyway
    LogOnly,
    /// Reject the frame
    Strict,
}

impl fmt::Display for CrcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrcPolicy::LogOnly => f.write_str("log-only"),
            CrcPolicy::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for CrcPolicy {
    type Err = BridgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log-only" | "log" => Ok(CrcPolicy::LogOnly),
            "strict" => Ok(CrcPolicy::Strict),
            other => Err(BridgeError::Config(format!(
                "CRC policy must be log-only or strict, got {:?}",
                other
            ))),
        }
    }
}

/// Where the weak-battery flag is read from
///
/// culfw documents the flag as `(first humidity digit & 0x8) >> 7`, which
/// never yields 1, so sensors are never reported weak. Installations that
/// want the flag from bit 7 of the humidity byte opt in explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeakBattery {
    /// The documented humidity-digit formula
    #[default]
    HumidityDigit,
    /// Bit 7 of the humidity byte
    HumidityBit7,
}

impl WeakBattery {
    fn is_weak(self, humidity_byte: u8) -> bool {
        match self {
            WeakBattery::HumidityDigit => ((humidity_byte >> 4) & 0x8) >> 7 == 1,
            WeakBattery::HumidityBit7 => humidity_byte & 0x80 != 0,
        }
    }
}

impl fmt::Display for WeakBattery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeakBattery::HumidityDigit => f.write_str("humidity-digit"),
            WeakBattery::HumidityBit7 => f.write_str("humidity-bit7"),
        }
    }
}

impl FromStr for WeakBattery {
    type Err = BridgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "humidity-digit" | "digit" => Ok(WeakBattery::HumidityDigit),
            "humidity-bit7" | "bit7" => Ok(WeakBattery::HumidityBit7),
            other => Err(BridgeError::Config(format!(
                "weak battery source must be humidity-digit or humidity-bit7, got {:?}",
                other
            ))),
        }
    }
}

/// One decoded sensor beacon
///
/// Serializes to the published state body `{temperature, humidity?, battery}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    #[serde(skip)]
    pub device_id: u8,

    #[serde(rename = "temperature")]
    pub temperature_celsius: f64,

    /// `None` for sensors without a humidity element
    #[serde(rename = "humidity", skip_serializing_if = "Option::is_none")]
    pub humidity_percent: Option<u8>,

    /// 10 (weak), 50 (normal) or 100 (new)
    #[serde(rename = "battery")]
    pub battery_percent: u8,
}

impl SensorReading {
    /// JSON body for the state topic
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Outcome of the CRC check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    Valid,
    Mismatch { received: u8, calculated: u8 },
}

/// A decoded frame together with its CRC outcome
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    pub reading: SensorReading,
    pub checksum: ChecksumStatus,
}

/// Decode one report line
///
/// Checks run in order: length, start marker, CRC. A CRC mismatch is
/// fatal only under [`CrcPolicy::Strict`].
pub fn decode(frame: &str, policy: CrcPolicy) -> Result<SensorFrame> {
    decode_with(frame, policy, WeakBattery::default())
}

/// [`decode`] with an explicit weak-battery source
pub fn decode_with(frame: &str, policy: CrcPolicy, weak: WeakBattery) -> Result<SensorFrame> {
    if frame.len() != FRAME_LEN || !frame.is_ascii() {
        return Err(BridgeError::MalformedFrame(format!(
            "unexpected sensor frame length {}: {:?}",
            frame.len(),
            frame
        )));
    }
    let bytes = frame.as_bytes();
    if bytes[START_MARKER_POS] != START_MARKER {
        return Err(BridgeError::BadStartMarker(frame.to_string()));
    }

    let received = hex_u8(frame, CRC)?;
    let calculated = crc8(&hex_bytes(frame, CRC_PAYLOAD)?);
    let checksum = if received == calculated {
        ChecksumStatus::Valid
    } else {
        if policy == CrcPolicy::Strict {
            return Err(BridgeError::ChecksumMismatch {
                received,
                calculated,
            });
        }
        tracing::warn!(
            frame,
            received,
            calculated,
            "sensor CRC mismatch, delivering anyway"
        );
        ChecksumStatus::Mismatch {
            received,
            calculated,
        }
    };

    let id_byte = hex_u8(frame, ID)?;
    let humidity_byte = hex_u8(frame, HUMIDITY)?;
    let digits = &frame[TEMPERATURE];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BridgeError::MalformedFrame(format!(
            "sensor temperature {:?} is not decimal in {:?}",
            digits, frame
        )));
    }
    let raw_temperature = digits
        .bytes()
        .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));

    let device_id = (id_byte & 0x3F) >> 2;
    let new_battery = (id_byte & 0x02) >> 1 == 1;
    let weak_battery = weak.is_weak(humidity_byte);

    let humidity = humidity_byte & 0x7F;
    let humidity_percent = (humidity != NO_HUMIDITY).then_some(humidity);

    let battery_percent = if weak_battery {
        10
    } else if new_battery {
        100
    } else {
        50
    };

    Ok(SensorFrame {
        reading: SensorReading {
            device_id,
            temperature_celsius: (f64::from(raw_temperature) - 400.0) / 10.0,
            humidity_percent,
            battery_percent,
        },
        checksum,
    })
}

fn hex_u8(frame: &str, range: Range<usize>) -> Result<u8> {
    let digits = &frame[range];
    let malformed = || {
        BridgeError::MalformedFrame(format!("{:?} is not a hex byte in {:?}", digits, frame))
    };
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    u8::from_str_radix(digits, 16).map_err(|_| malformed())
}

fn hex_bytes(frame: &str, range: Range<usize>) -> Result<Vec<u8>> {
    range
        .step_by(2)
        .map(|start| hex_u8(frame, start..start + 2))
        .collect()
}
