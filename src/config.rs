//! Configuration for culbridge
//!
//! Centralized configuration with sensible defaults.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::{BridgeError, Result};
use crate::protocol::{switch, CrcPolicy, OffBits, Protocol, WeakBattery};

/// Main configuration for a bridge instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Transport Configuration
    // -------------------------------------------------------------------------
    /// Serial device the CUL stick is attached to
    pub transport_path: String,

    /// Serial line speed
    pub baud_rate: u32,

    /// Inter-byte read timeout (milliseconds); an expired read yields no frame
    pub read_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Bus Configuration
    // -------------------------------------------------------------------------
    /// MQTT broker host
    pub bus_host: String,

    /// MQTT broker port
    pub bus_port: u16,

    /// Optional broker login
    pub bus_credentials: Option<BusCredentials>,

    /// First topic level for every topic the bridge consumes or produces
    pub topic_prefix: String,

    // -------------------------------------------------------------------------
    // State Configuration
    // -------------------------------------------------------------------------
    /// Root directory for persisted device state
    /// Internal structure:
    ///   {state_dir}/
    ///     └── somfy/           (one JSON record per shutter)
    pub state_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Protocols the router accepts traffic for
    pub enabled_protocols: BTreeSet<Protocol>,

    /// When set, switch commands for any other system code are ignored
    pub switch_system_id: Option<String>,

    /// Command bits sent for a switch OFF; no default, must be chosen per installation
    pub switch_off_bits: Option<OffBits>,

    /// What to do with sensor frames whose CRC does not match
    pub sensor_crc_policy: CrcPolicy,

    /// Where the sensor weak-battery flag is read from
    pub sensor_weak_battery: WeakBattery,
}

/// Broker login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusCredentials {
    pub username: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport_path: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 1000,
            bus_host: "localhost".to_string(),
            bus_port: 1883,
            bus_credentials: None,
            topic_prefix: "homeconnect".to_string(),
            state_dir: PathBuf::from("./state"),
            enabled_protocols: Protocol::ALL.into_iter().collect(),
            switch_system_id: None,
            switch_off_bits: None,
            sensor_crc_policy: CrcPolicy::LogOnly,
            sensor_weak_battery: WeakBattery::HumidityDigit,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Whether the router should handle traffic for `protocol`
    pub fn is_enabled(&self, protocol: Protocol) -> bool {
        self.enabled_protocols.contains(&protocol)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.topic_prefix.is_empty() {
            return Err(BridgeError::Config("topic prefix must not be empty".to_string()));
        }
        if self.topic_prefix.contains(['/', '+', '#']) {
            return Err(BridgeError::Config(format!(
                "topic prefix {:?} must be a single topic level without wildcards",
                self.topic_prefix
            )));
        }
        if let Some(system_id) = &self.switch_system_id {
            if !switch::is_code(system_id) {
                return Err(BridgeError::Config(format!(
                    "switch system id {:?} must be 5 symbols of 0/F",
                    system_id
                )));
            }
        }
        if self.is_enabled(Protocol::Switch) && self.switch_off_bits.is_none() {
            return Err(BridgeError::Config(
                "switch OFF command bits must be chosen explicitly (0F or F0)".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding the cover state records
    pub fn cover_state_dir(&self) -> PathBuf {
        self.state_dir.join("somfy")
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the serial device path
    pub fn transport_path(mut self, path: impl Into<String>) -> Self {
        self.config.transport_path = path.into();
        self
    }

    /// Set the serial line speed
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.config.baud_rate = baud;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the broker host
    pub fn bus_host(mut self, host: impl Into<String>) -> Self {
        self.config.bus_host = host.into();
        self
    }

    /// Set the broker port
    pub fn bus_port(mut self, port: u16) -> Self {
        self.config.bus_port = port;
        self
    }

    /// Set the broker login
    pub fn bus_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.bus_credentials = Some(BusCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Set the topic prefix
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.topic_prefix = prefix.into();
        self
    }

    /// Set the state directory
    pub fn state_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_dir = path.into();
        self
    }

    /// Replace the set of enabled protocols
    pub fn enabled_protocols(mut self, protocols: impl IntoIterator<Item = Protocol>) -> Self {
        self.config.enabled_protocols = protocols.into_iter().collect();
        self
    }

    /// Restrict switch commands to one system code
    pub fn switch_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.config.switch_system_id = Some(system_id.into().to_ascii_uppercase());
        self
    }

    /// Choose the switch OFF command bits
    pub fn switch_off_bits(mut self, bits: OffBits) -> Self {
        self.config.switch_off_bits = Some(bits);
        self
    }

    /// Set the sensor CRC policy
    pub fn sensor_crc_policy(mut self, policy: CrcPolicy) -> Self {
        self.config.sensor_crc_policy = policy;
        self
    }

    /// Choose where the weak-battery flag is read from
    pub fn sensor_weak_battery(mut self, source: WeakBattery) -> Self {
        self.config.sensor_weak_battery = source;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
