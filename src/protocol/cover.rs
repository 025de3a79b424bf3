//! Somfy RTS cover codec
//!
//! Every frame embeds the device's rotating key nibble and rolling code, so
//! encoding a command also yields the state the device must be left in.
//! Persisting that state is the caller's job (see [`crate::state`]).

use std::fmt;
use std::str::FromStr;

use crate::checksum::nibble_xor;
use crate::error::{BridgeError, Result};
use crate::state::CoverDeviceState;

/// Line prefix of a Somfy send command
pub const FRAME_PREFIX: &str = "Ys";

/// Characters in the hex body after the prefix
pub const BODY_LEN: usize = 14;

/// Position of the checksum nibble inside the body
pub const CHECKSUM_INDEX: usize = 3;

/// Constant high nibble of the key byte
const KEY_HIGH_NIBBLE: char = 'A';

/// Commands a Somfy remote can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverCommand {
    My,
    Up,
    MyUp,
    Down,
    MyDown,
    UpDown,
    MyUpDown,
    Prog,
    EnableSun,
    DisableSun,
}

impl CoverCommand {
    pub const ALL: [CoverCommand; 10] = [
        CoverCommand::My,
        CoverCommand::Up,
        CoverCommand::MyUp,
        CoverCommand::Down,
        CoverCommand::MyDown,
        CoverCommand::UpDown,
        CoverCommand::MyUpDown,
        CoverCommand::Prog,
        CoverCommand::EnableSun,
        CoverCommand::DisableSun,
    ];

    /// 4-bit opcode carried in the frame
    pub fn opcode(self) -> u8 {
        match self {
            CoverCommand::My => 1,
            CoverCommand::Up => 2,
            CoverCommand::MyUp => 3,
            CoverCommand::Down => 4,
            CoverCommand::MyDown => 5,
            CoverCommand::UpDown => 6,
            CoverCommand::MyUpDown => 7,
            CoverCommand::Prog => 8,
            CoverCommand::EnableSun => 9,
            CoverCommand::DisableSun => 10,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.opcode() == opcode)
    }

    /// Remote button name
    pub fn name(self) -> &'static str {
        match self {
            CoverCommand::My => "my",
            CoverCommand::Up => "up",
            CoverCommand::MyUp => "my-up",
            CoverCommand::Down => "down",
            CoverCommand::MyDown => "my-down",
            CoverCommand::UpDown => "up-down",
            CoverCommand::MyUpDown => "my-up-down",
            CoverCommand::Prog => "prog",
            CoverCommand::EnableSun => "enable-sun",
            CoverCommand::DisableSun => "disable-sun",
        }
    }

    /// Parse a bus payload
    ///
    /// `OPEN`, `CLOSE` and `STOP` map to up, down and my; button names
    /// are accepted as well so a device can be paired over the bus.
    pub fn from_payload(payload: &str) -> Result<Self> {
        match payload.trim() {
            "OPEN" => Ok(CoverCommand::Up),
            "CLOSE" => Ok(CoverCommand::Down),
            "STOP" => Ok(CoverCommand::My),
            other => other.parse(),
        }
    }
}

impl fmt::Display for CoverCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CoverCommand {
    type Err = BridgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| BridgeError::UnsupportedCommand(format!("cover command {:?}", s)))
    }
}

/// Fields of an encoded cover frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverFrame {
    pub key_nibble: u8,
    pub command: CoverCommand,
    pub rolling_code: u16,
    pub address: u32,
}

/// Checksum of a body, with the checksum position treated as `0`
///
/// Whatever currently sits at [`CHECKSUM_INDEX`] is ignored.
pub fn checksum(body: &[u8]) -> u8 {
    let mut zeroed = body.to_vec();
    if let Some(slot) = zeroed.get_mut(CHECKSUM_INDEX) {
        *slot = b'0';
    }
    nibble_xor(&zeroed)
}

/// Build the 14-character body for `command` under `state`
pub fn encode_body(command: CoverCommand, state: &CoverDeviceState) -> String {
    let mut body = format!(
        "{}{:01X}{:01X}0{:04X}{:06X}",
        KEY_HIGH_NIBBLE,
        state.encryption_key_nibble & 0x0F,
        command.opcode(),
        state.rolling_code & 0xFFFF,
        state.address & 0xFF_FFFF,
    );
    let cks = checksum(body.as_bytes());
    body.replace_range(
        CHECKSUM_INDEX..=CHECKSUM_INDEX,
        &format!("{:01X}", cks),
    );
    body
}

/// Encode `command` for the device in `state`
///
/// Returns the culfw line and the state the device moves to once the
/// line has been sent.
pub fn encode(command: CoverCommand, state: &CoverDeviceState) -> (Vec<u8>, CoverDeviceState) {
    let line = format!("{}{}\n", FRAME_PREFIX, encode_body(command, state));
    (line.into_bytes(), state.advanced())
}

/// Parse a line produced by [`encode`] and verify its checksum
pub fn decode_frame(frame: &[u8]) -> Result<CoverFrame> {
    let text = std::str::from_utf8(frame)
        .map_err(|_| BridgeError::MalformedFrame("cover frame is not ASCII".to_string()))?
        .trim_end();

    let body = text
        .strip_prefix(FRAME_PREFIX)
        .ok_or_else(|| BridgeError::BadStartMarker(text.to_string()))?;
    if body.len() != BODY_LEN || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(BridgeError::MalformedFrame(format!(
            "cover frame {:?} is not {} hex digits",
            text, BODY_LEN
        )));
    }
    if !body.starts_with(KEY_HIGH_NIBBLE) {
        return Err(BridgeError::BadStartMarker(text.to_string()));
    }

    let hex = |range: std::ops::Range<usize>| -> Result<u32> {
        u32::from_str_radix(&body[range], 16)
            .map_err(|e| BridgeError::MalformedFrame(format!("cover frame {:?}: {}", text, e)))
    };

    let received = hex(CHECKSUM_INDEX..CHECKSUM_INDEX + 1)? as u8;
    let calculated = checksum(body.as_bytes());
    if received != calculated {
        return Err(BridgeError::ChecksumMismatch {
            received,
            calculated,
        });
    }

    let opcode = hex(2..3)? as u8;
    let command = CoverCommand::from_opcode(opcode).ok_or_else(|| {
        BridgeError::UnsupportedCommand(format!("cover opcode {}", opcode))
    })?;

    Ok(CoverFrame {
        key_nibble: hex(1..2)? as u8,
        command,
        rolling_code: hex(4..8)? as u16,
        address: hex(8..14)?,
    })
}
