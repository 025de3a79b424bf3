//! Intertechno switch codec
//!
//! Fire-and-forget on/off frames. There is no feedback channel, so a frame
//! the transport accepted is all a caller can ever know about.

use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// Line prefix of an Intertechno send command
pub const FRAME_PREFIX: &str = "is";

/// Symbols in a system or unit code
pub const CODE_LEN: usize = 5;

/// Command bits for ON (identical in every firmware variant)
pub const ON_BITS: &str = "FF";

/// Length of an encoded frame including the trailing newline
pub const FRAME_LEN: usize = FRAME_PREFIX.len() + 2 * CODE_LEN + 2 + 1;

/// Requested switch state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchAction {
    On,
    Off,
}

impl SwitchAction {
    /// Parse a bus payload (`ON` / `OFF`)
    pub fn from_payload(payload: &str) -> Result<Self> {
        match payload.trim() {
            "ON" => Ok(SwitchAction::On),
            "OFF" => Ok(SwitchAction::Off),
            other => Err(BridgeError::UnsupportedCommand(format!(
                "switch payload {:?}",
                other
            ))),
        }
    }
}

/// Command bits a receiver expects for OFF
///
/// Installations disagree on this, so it is never defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffBits {
    /// `0F`
    ZeroF,
    /// `F0`
    FZero,
}

impl OffBits {
    pub fn bits(self) -> &'static str {
        match self {
            OffBits::ZeroF => "0F",
            OffBits::FZero => "F0",
        }
    }
}

impl fmt::Display for OffBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bits())
    }
}

impl FromStr for OffBits {
    type Err = BridgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "0F" => Ok(OffBits::ZeroF),
            "F0" => Ok(OffBits::FZero),
            other => Err(BridgeError::Config(format!(
                "switch OFF bits must be 0F or F0, got {:?}",
                other
            ))),
        }
    }
}

/// A single switch command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCommand {
    /// House / system code, 5 symbols of `0` or `F`
    pub system_id: String,
    /// Unit code, 5 symbols of `0` or `F`
    pub unit_id: String,
    pub action: SwitchAction,
}

impl SwitchCommand {
    /// Build a command, validating both codes
    pub fn new(system_id: &str, unit_id: &str, action: SwitchAction) -> Result<Self> {
        let system_id = system_id.to_ascii_uppercase();
        let unit_id = unit_id.to_ascii_uppercase();
        if !is_code(&system_id) || !is_code(&unit_id) {
            return Err(BridgeError::InvalidAddress(format!(
                "switch codes {:?}/{:?} must be 5 symbols of 0/F each",
                system_id, unit_id
            )));
        }
        Ok(Self {
            system_id,
            unit_id,
            action,
        })
    }

    /// Build a command from a 10-symbol device address (system + unit)
    pub fn from_address(address: &str, action: SwitchAction) -> Result<Self> {
        let (system_id, unit_id) = split_address(address)?;
        Self::new(&system_id, &unit_id, action)
    }

    /// System and unit code joined, as used in topics
    pub fn address(&self) -> String {
        format!("{}{}", self.system_id, self.unit_id)
    }
}

/// Whether `code` is exactly 5 symbols of `0`/`F`
pub fn is_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b == b'0' || b == b'F')
}

/// Split a 10-symbol device address into uppercase system and unit codes
pub fn split_address(address: &str) -> Result<(String, String)> {
    let address = address.to_ascii_uppercase();
    if address.len() != 2 * CODE_LEN || !address.is_ascii() {
        return Err(BridgeError::InvalidAddress(format!(
            "switch address {:?} must be 10 symbols of 0/F",
            address
        )));
    }
    let (system_id, unit_id) = address.split_at(CODE_LEN);
    if !is_code(system_id) || !is_code(unit_id) {
        return Err(BridgeError::InvalidAddress(format!(
            "switch address {:?} must be 10 symbols of 0/F",
            address
        )));
    }
    Ok((system_id.to_string(), unit_id.to_string()))
}

/// Encode a command as a culfw line
pub fn encode(command: &SwitchCommand, off: OffBits) -> Vec<u8> {
    let bits = match command.action {
        SwitchAction::On => ON_BITS,
        SwitchAction::Off => off.bits(),
    };
    format!(
        "{}{}{}{}\n",
        FRAME_PREFIX, command.system_id, command.unit_id, bits
    )
    .into_bytes()
}

/// Parse a line produced by [`encode`] back into a command
pub fn decode_frame(frame: &[u8], off: OffBits) -> Result<SwitchCommand> {
    let text = std::str::from_utf8(frame)
        .map_err(|_| BridgeError::MalformedFrame("switch frame is not ASCII".to_string()))?
        .trim_end();

    let body = text.strip_prefix(FRAME_PREFIX).ok_or_else(|| {
        BridgeError::BadStartMarker(text.to_string())
    })?;
    if body.len() != 2 * CODE_LEN + 2 || !body.is_ascii() {
        return Err(BridgeError::MalformedFrame(format!(
            "switch frame {:?} has wrong length",
            text
        )));
    }

    let (address, bits) = body.split_at(2 * CODE_LEN);
    let action = if bits == ON_BITS {
        SwitchAction::On
    } else if bits == off.bits() {
        SwitchAction::Off
    } else {
        return Err(BridgeError::UnsupportedCommand(format!(
            "switch command bits {:?}",
            bits
        )));
    };

    SwitchCommand::from_address(address, action)
}
