//! State Module
//!
//! Durable per-shutter state for the Somfy RTS protocol.
//!
//! ## Responsibilities
//! - Hold the rolling code and rotating key nibble of every shutter
//! - Advance both in lock-step, persisting before any frame leaves
//! - Survive restarts without ever reusing a code
//!
//! ## File Format
//! One JSON object per shutter in `{state_dir}/somfy/`:
//! ```text
//! {"address": "ABCDEF", "enc_key": 7, "rolling_code": 4660,
//!  "device_class": "shutter", "name": "Living room"}
//! ```
//! Records are replaced atomically (temp file, fsync, rename).

mod store;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

pub use store::{DeviceRecord, DeviceStateStore};

/// Rolling codes wrap to 0 at this value
pub const ROLLING_CODE_MODULUS: u32 = 0x100_0000;

/// Key nibbles wrap to 0 at this value
pub const KEY_MODULUS: u8 = 0x10;

/// Largest valid shutter address
pub const MAX_ADDRESS: u32 = 0xFF_FFFF;

/// Persisted state of one shutter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverDeviceState {
    /// 24-bit remote address the shutter was paired with
    #[serde(with = "hex_address")]
    pub address: u32,

    #[serde(rename = "enc_key")]
    pub encryption_key_nibble: u8,

    /// 24-bit counter, one step per transmitted frame
    pub rolling_code: u32,

    #[serde(default = "default_device_class")]
    pub device_class: String,

    #[serde(rename = "name")]
    pub display_name: String,
}

fn default_device_class() -> String {
    "shutter".to_string()
}

impl CoverDeviceState {
    /// A fresh record with key nibble and rolling code at zero
    pub fn new(address: u32, display_name: impl Into<String>) -> Self {
        Self {
            address,
            encryption_key_nibble: 0,
            rolling_code: 0,
            device_class: default_device_class(),
            display_name: display_name.into(),
        }
    }

    /// The state after one more frame has been sent
    pub fn advanced(&self) -> Self {
        Self {
            rolling_code: next_rolling_code(self.rolling_code),
            encryption_key_nibble: next_key_nibble(self.encryption_key_nibble),
            ..self.clone()
        }
    }

    /// Address as 6 uppercase hex digits
    pub fn address_hex(&self) -> String {
        format!("{:06X}", self.address)
    }

    /// Check all fields are inside their bit widths
    pub fn validate(&self) -> Result<()> {
        if self.address > MAX_ADDRESS {
            return Err(BridgeError::InvalidAddress(format!(
                "cover address 0x{:X} exceeds 24 bits",
                self.address
            )));
        }
        if self.encryption_key_nibble >= KEY_MODULUS {
            return Err(BridgeError::PersistenceFailure(format!(
                "key nibble {} of {} exceeds 4 bits",
                self.encryption_key_nibble,
                self.address_hex()
            )));
        }
        if self.rolling_code >= ROLLING_CODE_MODULUS {
            return Err(BridgeError::PersistenceFailure(format!(
                "rolling code {} of {} exceeds 24 bits",
                self.rolling_code,
                self.address_hex()
            )));
        }
        Ok(())
    }
}

/// Successor of a rolling code, wrapping at 2^24
pub fn next_rolling_code(code: u32) -> u32 {
    code.wrapping_add(1) % ROLLING_CODE_MODULUS
}

/// Successor of a key nibble, wrapping at 16
pub fn next_key_nibble(nibble: u8) -> u8 {
    nibble.wrapping_add(1) % KEY_MODULUS
}

/// A cover frame that left through the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    /// The culfw line, newline included
    pub frame: Vec<u8>,
    /// The state the frame was encoded with
    pub sent_with: CoverDeviceState,
}

/// Parse a 6-hex-digit shutter address
pub fn parse_address(text: &str) -> Result<u32> {
    if text.len() != 6 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(BridgeError::InvalidAddress(format!(
            "cover address {:?} must be 6 hex digits",
            text
        )));
    }
    u32::from_str_radix(text, 16)
        .map_err(|e| BridgeError::InvalidAddress(format!("cover address {:?}: {}", text, e)))
}

mod hex_address {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:06X}", address))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_address(&text).map_err(D::Error::custom)
    }
}
