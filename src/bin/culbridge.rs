//! culbridge daemon
//!
//! Connects a CUL transceiver to an MQTT broker and runs until either side
//! goes away.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use culbridge::bridge::{Bridge, Listener};
use culbridge::bus::{Bus, MosquittoBus};
use culbridge::protocol::{CrcPolicy, OffBits, Protocol, WeakBattery};
use culbridge::transport::SerialTransport;
use culbridge::{Config, Router};
use tracing_subscriber::{fmt, EnvFilter};

/// CUL ↔ MQTT bridge
#[derive(Parser, Debug)]
#[command(name = "culbridge")]
#[command(about = "Bridge Intertechno, Somfy RTS and LaCrosse IT+ devices to MQTT via a CUL stick")]
#[command(version)]
struct Args {
    /// Serial device of the CUL stick
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    cul: String,

    /// Serial line speed
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Serial read timeout in milliseconds
    #[arg(long, default_value = "1000")]
    read_timeout_ms: u64,

    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    mqtt_host: String,

    /// MQTT broker port
    #[arg(long, default_value = "1883")]
    mqtt_port: u16,

    /// MQTT username
    #[arg(long, requires = "mqtt_password")]
    mqtt_username: Option<String>,

    /// MQTT password
    #[arg(long, requires = "mqtt_username")]
    mqtt_password: Option<String>,

    /// First topic level for all topics
    #[arg(short, long, default_value = "homeconnect")]
    prefix: String,

    /// Directory for persisted device state
    #[arg(short, long, default_value = "./state")]
    state_dir: PathBuf,

    /// Protocols to enable (switch, cover, sensor)
    #[arg(long, value_delimiter = ',', default_value = "switch,cover,sensor")]
    protocols: Vec<Protocol>,

    /// Only accept switch commands for this 5-symbol system code
    #[arg(long)]
    switch_system_id: Option<String>,

    /// Command bits for switch OFF (0F or F0); required with the switch protocol
    #[arg(long)]
    switch_off_bits: Option<OffBits>,

    /// Sensor CRC mismatch handling (log-only or strict)
    #[arg(long, default_value = "log-only")]
    crc_policy: CrcPolicy,

    /// Where the sensor weak-battery flag is read from (humidity-digit or humidity-bit7)
    #[arg(long, default_value = "humidity-digit")]
    weak_battery: WeakBattery,

    /// Debug logging for culbridge
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging
    let default_filter = if args.verbose { "info,culbridge=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("culbridge v{}", culbridge::VERSION);
    tracing::info!("CUL device: {}", args.cul);
    tracing::info!("MQTT broker: {}:{}", args.mqtt_host, args.mqtt_port);

    // Build config from args
    let mut builder = Config::builder()
        .transport_path(&args.cul)
        .baud_rate(args.baud)
        .read_timeout_ms(args.read_timeout_ms)
        .bus_host(&args.mqtt_host)
        .bus_port(args.mqtt_port)
        .topic_prefix(&args.prefix)
        .state_dir(&args.state_dir)
        .enabled_protocols(args.protocols.iter().copied())
        .sensor_crc_policy(args.crc_policy)
        .sensor_weak_battery(args.weak_battery);
    if let (Some(username), Some(password)) = (&args.mqtt_username, &args.mqtt_password) {
        builder = builder.bus_credentials(username, password);
    }
    if let Some(system_id) = &args.switch_system_id {
        builder = builder.switch_system_id(system_id);
    }
    if let Some(bits) = args.switch_off_bits {
        builder = builder.switch_off_bits(bits);
    }
    let config = builder.build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // Open transceiver: one handle for writing, a clone for the RF loop
    let writer = match SerialTransport::open(&config.transport_path, config.baud_rate, config.read_timeout_ms) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to open transceiver: {}", e);
            std::process::exit(1);
        }
    };
    let reader = match writer.try_clone() {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to clone transceiver handle: {}", e);
            std::process::exit(1);
        }
    };

    let bus: Arc<dyn Bus> = match MosquittoBus::new(&config) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            tracing::error!("Failed to prepare bus client: {}", e);
            std::process::exit(1);
        }
    };

    let router = match Router::open(config, Box::new(writer), Arc::clone(&bus)) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            tracing::error!("Failed to open router: {}", e);
            std::process::exit(1);
        }
    };

    let source = match bus.subscribe(&router.subscription_pattern()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to subscribe: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Router initialized, listening on {}", router.subscription_pattern());

    let bridge = Bridge::new(router);
    match bridge.run(Box::new(reader), source) {
        Ok((listener, Ok(()))) => tracing::info!("{:?} listener stopped, shutting down", listener),
        Ok((Listener::Rf, Err(e))) => {
            tracing::error!("Transceiver error: {}", e);
            std::process::exit(1);
        }
        Ok((Listener::Bus, Err(e))) => {
            tracing::error!("Bus error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("Bridge error: {}", e);
            std::process::exit(1);
        }
    }

    tracing::info!("Bridge stopped");
}
