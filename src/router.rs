//! Router Module
//!
//! Dispatches bus messages to protocol encoders and RF lines to protocol
//! decoders.
//!
//! ## Responsibilities
//! - Parse `{prefix}/{device_type}/{component}/{device_name}[/{subtopic}]`
//! - Validate topic levels against the owning protocol
//! - Keep cover state durable before any cover frame leaves
//! - Publish decoded sensor readings and flag first sightings

use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::{Bus, BusMessage};
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::protocol::{sensor, switch, CoverCommand, Protocol, SensorFrame, SwitchAction, SwitchCommand};
use crate::registry::KnownDeviceRegistry;
use crate::state::DeviceStateStore;
use crate::transport::Transport;

/// Result of handling one bus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A frame was handed to the transport
    Transmitted { protocol: Protocol, frame: Vec<u8> },
    /// The message was not a command for this bridge
    Ignored(IgnoreReason),
}

/// Why a bus message produced no frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Fewer than four topic levels
    UnparsableTopic,
    /// First level is not our prefix
    ForeignPrefix,
    /// Component names no protocol
    UnknownComponent,
    /// Protocol is switched off in the config
    ProtocolDisabled,
    /// Subtopic other than `set` (e.g. our own `config`/`state` echoes)
    NotACommand,
    /// Protocol has no outbound frames
    ReceiveOnly,
    /// Switch address belongs to another system code
    ForeignSystem,
}

/// Result of handling one RF line
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Nothing but whitespace
    Empty,
    /// No enabled decoder claims the line
    Unhandled,
    /// A sensor reading was decoded and published
    ///
    /// The router publishes state only. Emitting discovery or config
    /// messages for a newly announced sensor is left to the caller.
    Reading(SensorEvent),
}

/// A published sensor reading
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub topic: String,
    pub frame: SensorFrame,
    /// First successfully published reading from this id since startup
    pub announce: bool,
}

/// Protocol router
///
/// ## Concurrency Model
///
/// Both the RF loop and the bus loop call in through `&self`:
/// - cover commands serialize per device inside [`DeviceStateStore`]
///   (state read → encode → persist → transmit under one lock)
/// - transport writes serialize on `transport`
/// - the sensor registry has its own lock
pub struct Router {
    /// Bridge configuration
    config: Config,

    /// Cover state, present when the cover protocol is enabled
    store: Option<DeviceStateStore>,

    /// Sensors announced so far
    registry: KnownDeviceRegistry,

    /// Write side of the transceiver link
    transport: Mutex<Box<dyn Transport>>,

    /// Bus used for publishing readings
    bus: Arc<dyn Bus>,
}

impl Router {
    /// Build a router over the given collaborators
    ///
    /// Validates `config` and loads cover state when covers are enabled.
    pub fn open(config: Config, transport: Box<dyn Transport>, bus: Arc<dyn Bus>) -> Result<Self> {
        config.validate()?;

        let store = if config.is_enabled(Protocol::Cover) {
            let store = DeviceStateStore::open(&config.cover_state_dir())?;
            tracing::info!(
                devices = store.len(),
                corrupt = store.corrupt_files().len(),
                dir = %store.dir().display(),
                "cover state loaded"
            );
            Some(store)
        } else {
            None
        };

        Ok(Self {
            config,
            store,
            registry: KnownDeviceRegistry::new(),
            transport: Mutex::new(transport),
            bus,
        })
    }

    /// Prepare the transceiver for the enabled protocols
    pub fn start(&self) -> Result<()> {
        if self.config.is_enabled(Protocol::Sensor) {
            tracing::debug!("enabling native RF receive mode 1");
            self.transmit(sensor::LISTEN_COMMAND)?;
        }
        Ok(())
    }

    /// Topic filter covering every command this router accepts
    pub fn subscription_pattern(&self) -> String {
        format!("{}/#", self.config.topic_prefix)
    }

    // =========================================================================
    // Outbound: bus → RF
    // =========================================================================

    /// Handle one inbound bus message
    pub fn handle_message(&self, message: &BusMessage) -> Result<Dispatch> {
        let levels: Vec<&str> = message.topic.splitn(5, '/').collect();
        if levels.len() < 4 {
            tracing::warn!(topic = %message.topic, "cannot parse topic");
            return Ok(Dispatch::Ignored(IgnoreReason::UnparsableTopic));
        }
        let (prefix, device_type, component, device_name) = (levels[0], levels[1], levels[2], levels[3]);
        let subtopic = levels.get(4).copied();

        if prefix != self.config.topic_prefix {
            tracing::info!(topic = %message.topic, "ignoring message due to prefix");
            return Ok(Dispatch::Ignored(IgnoreReason::ForeignPrefix));
        }

        let protocol = match Protocol::from_component(component) {
            Some(protocol) => protocol,
            None => {
                tracing::warn!(component, topic = %message.topic, "component unknown");
                return Ok(Dispatch::Ignored(IgnoreReason::UnknownComponent));
            }
        };
        if !self.config.is_enabled(protocol) {
            tracing::debug!(%protocol, "protocol disabled");
            return Ok(Dispatch::Ignored(IgnoreReason::ProtocolDisabled));
        }
        if !matches!(subtopic, None | Some("set")) {
            tracing::trace!(topic = %message.topic, "ignoring subtopic");
            return Ok(Dispatch::Ignored(IgnoreReason::NotACommand));
        }
        if !protocol.encodes_outbound() {
            tracing::debug!(%protocol, "receive-only protocol, no commands");
            return Ok(Dispatch::Ignored(IgnoreReason::ReceiveOnly));
        }
        if device_type != protocol.device_type() {
            return Err(BridgeError::ProtocolMismatch(format!(
                "{} can only handle {} devices, got {:?}",
                protocol,
                protocol.device_type(),
                device_type
            )));
        }

        let payload = message.payload_str();
        match protocol {
            Protocol::Switch => self.send_switch(device_name, &payload),
            Protocol::Cover => self.send_cover(device_name, &payload),
            Protocol::Sensor => Ok(Dispatch::Ignored(IgnoreReason::ReceiveOnly)),
        }
    }

    fn send_switch(&self, device_name: &str, payload: &str) -> Result<Dispatch> {
        let (system_id, unit_id) = switch::split_address(device_name)?;

        if let Some(own) = &self.config.switch_system_id {
            if *own != system_id {
                tracing::info!(system_id = %system_id, "command for different Intertechno system, ignoring");
                return Ok(Dispatch::Ignored(IgnoreReason::ForeignSystem));
            }
        }

        let off = self.config.switch_off_bits.ok_or_else(|| {
            BridgeError::Config("switch OFF command bits not configured".to_string())
        })?;
        let action = SwitchAction::from_payload(payload)?;
        let command = SwitchCommand::new(&system_id, &unit_id, action)?;
        let frame = switch::encode(&command, off);

        tracing::debug!(address = %command.address(), ?action, "sending intertechno command");
        self.transmit(&frame)?;

        Ok(Dispatch::Transmitted {
            protocol: Protocol::Switch,
            frame,
        })
    }

    fn send_cover(&self, device_name: &str, payload: &str) -> Result<Dispatch> {
        let store = self.store.as_ref().ok_or_else(|| {
            BridgeError::Config("cover protocol enabled without state store".to_string())
        })?;
        if device_name.is_empty() {
            return Err(BridgeError::InvalidAddress("empty cover name".to_string()));
        }
        let address = store
            .resolve(device_name)
            .ok_or_else(|| BridgeError::UnknownDevice(device_name.to_string()))?;
        let command = CoverCommand::from_payload(payload)?;

        let sent = store.send_command(address, command, |frame| self.transmit(frame))?;

        tracing::info!(
            name = %sent.sent_with.display_name,
            address = %sent.sent_with.address_hex(),
            %command,
            rolling_code = sent.sent_with.rolling_code,
            "sent somfy command"
        );

        Ok(Dispatch::Transmitted {
            protocol: Protocol::Cover,
            frame: sent.frame,
        })
    }

    fn transmit(&self, frame: &[u8]) -> Result<()> {
        self.transport.lock().write_frame(frame)
    }

    // =========================================================================
    // Inbound: RF → bus
    // =========================================================================

    /// Handle one line received from the transceiver
    ///
    /// Decode failures are returned for logging; nothing is published for
    /// them and nothing is retried.
    pub fn handle_rf_line(&self, line: &str) -> Result<Inbound> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Inbound::Empty);
        }

        match Protocol::from_frame(line) {
            Some(Protocol::Sensor) if self.config.is_enabled(Protocol::Sensor) => {
                self.receive_sensor(line)
            }
            _ => {
                tracing::info!(line, "can't handle RF message");
                Ok(Inbound::Unhandled)
            }
        }
    }

    fn receive_sensor(&self, line: &str) -> Result<Inbound> {
        let frame = sensor::decode_with(
            line,
            self.config.sensor_crc_policy,
            self.config.sensor_weak_battery,
        )?;
        let device_id = frame.reading.device_id;

        let topic = format!(
            "{}/{}/{}/{}/state",
            self.config.topic_prefix,
            Protocol::Sensor.device_type(),
            Protocol::Sensor.component(),
            device_id
        );
        let payload = frame.reading.to_payload()?;
        self.bus.publish(&topic, &payload, false)?;

        // Only a delivered reading counts as seen
        let announce = self.registry.mark_seen(device_id);
        if announce {
            tracing::info!(device_id, "new lacrosse sensor");
        } else {
            tracing::trace!(device_id, known = ?self.registry.known(), "known lacrosse sensor");
        }

        Ok(Inbound::Reading(SensorEvent {
            topic,
            frame,
            announce,
        }))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cover state store, when covers are enabled
    pub fn store(&self) -> Option<&DeviceStateStore> {
        self.store.as_ref()
    }

    /// Sensors seen since startup
    pub fn registry(&self) -> &KnownDeviceRegistry {
        &self.registry
    }
}
