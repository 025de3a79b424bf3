//! Protocol Module
//!
//! Frame codecs for the three RF protocols spoken through the CUL stick.
//!
//! ## Serial Line Formats (culfw)
//!
//! ### Intertechno switch (send only)
//! ```text
//! ┌──────┬──────────────┬──────────────┬──────────┬────┐
//! │ "is" │ system (5)   │ unit (5)     │ cmd (2)  │ \n │
//! └──────┴──────────────┴──────────────┴──────────┴────┘
//! ```
//!
//! ### Somfy RTS cover (send only)
//! ```text
//! ┌──────┬─────┬─────┬─────┬─────┬───────────┬─────────────┬────┐
//! │ "Ys" │ "A" │ key │ cmd │ cks │ rolling(4)│ address (6) │ \n │
//! └──────┴─────┴─────┴─────┴─────┴───────────┴─────────────┴────┘
//! ```
//!
//! ### LaCrosse IT+ sensor (receive only)
//! ```text
//! ┌───────┬─────┬────────┬──────────┬──────────┬─────────┬───────────┐
//! │ "N01" │ "9" │ id (2) │ temp (3) │ hum (2)  │ crc (2) │ trailer   │
//! └───────┴─────┴────────┴──────────┴──────────┴─────────┴───────────┘
//! ```

pub mod cover;
pub mod sensor;
pub mod switch;

use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

pub use cover::{CoverCommand, CoverFrame};
pub use sensor::{ChecksumStatus, CrcPolicy, SensorFrame, SensorReading, WeakBattery};
pub use switch::{OffBits, SwitchAction, SwitchCommand};

/// The protocols the bridge routes
///
/// Each variant owns one topic `component` and, where it has one, one
/// inbound frame marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    /// Intertechno on/off remote switches
    Switch,
    /// Somfy RTS rolling-code shutters
    Cover,
    /// LaCrosse IT+ temperature/humidity sensors
    Sensor,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Switch, Protocol::Cover, Protocol::Sensor];

    /// Third topic level identifying the protocol
    pub fn component(self) -> &'static str {
        match self {
            Protocol::Switch => "intertechno",
            Protocol::Cover => "somfy",
            Protocol::Sensor => "lacrosse",
        }
    }

    /// Second topic level a message for this protocol must carry
    pub fn device_type(self) -> &'static str {
        match self {
            Protocol::Switch => "switch",
            Protocol::Cover => "cover",
            Protocol::Sensor => "sensor",
        }
    }

    /// Look up the protocol owning a topic component
    pub fn from_component(component: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.component() == component)
    }

    /// Look up the protocol owning an inbound RF line
    pub fn from_frame(line: &str) -> Option<Self> {
        if line.starts_with(sensor::FRAME_MARKER) {
            Some(Protocol::Sensor)
        } else {
            None
        }
    }

    /// Whether bus messages can produce RF frames for this protocol
    pub fn encodes_outbound(self) -> bool {
        !matches!(self, Protocol::Sensor)
    }

    /// Whether received RF frames carry data for this protocol
    pub fn decodes_inbound(self) -> bool {
        matches!(self, Protocol::Sensor)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component())
    }
}

impl FromStr for Protocol {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "switch" | "intertechno" => Ok(Protocol::Switch),
            "cover" | "somfy" => Ok(Protocol::Cover),
            "sensor" | "lacrosse" => Ok(Protocol::Sensor),
            other => Err(BridgeError::Config(format!("unknown protocol {:?}", other))),
        }
    }
}
