//! cul-cli
//!
//! One-shot commands against the CUL stick and the cover state directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use culbridge::protocol::{
    cover, sensor, switch, CoverCommand, CrcPolicy, OffBits, SwitchAction, SwitchCommand, WeakBattery,
};
use culbridge::state::{parse_address, CoverDeviceState};
use culbridge::transport::{SerialTransport, Transport};
use culbridge::{BridgeError, Config, DeviceStateStore, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// culbridge CLI
#[derive(Parser, Debug)]
#[command(name = "cul-cli")]
#[command(about = "Send single RF commands and inspect frames")]
struct Args {
    /// Serial device of the CUL stick
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    cul: String,

    /// Serial line speed
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Directory for persisted device state
    #[arg(short, long, default_value = "./state")]
    state_dir: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a command to a Somfy shutter
    Cover {
        /// Display name or 6-hex-digit address
        name: String,

        /// OPEN, CLOSE, STOP or a raw command (my, up, down, prog, ...)
        command: String,
    },

    /// Switch an Intertechno outlet
    Switch {
        /// 10 symbols of 0/F (system code + unit code)
        address: String,

        /// on or off
        action: String,

        /// Command bits for OFF (0F or F0)
        #[arg(long)]
        off_bits: OffBits,
    },

    /// Decode a received LaCrosse line or an outbound frame
    Decode {
        /// The line, e.g. N0199E6282EC7AAAA0000719199
        frame: String,

        /// Reject sensor frames with a bad CRC
        #[arg(long)]
        strict: bool,

        /// Where the weak-battery flag is read from
        #[arg(long, default_value = "humidity-digit")]
        weak_battery: WeakBattery,

        /// OFF bits used to read `is…` switch frames
        #[arg(long, default_value = "0F")]
        off_bits: OffBits,
    },

    /// Create a state record for a new shutter
    Register {
        /// 6-hex-digit remote address
        address: String,

        /// Display name used in topics
        name: String,

        #[arg(long, default_value = "shutter")]
        device_class: String,

        /// Starting rolling code
        #[arg(long, default_value = "0")]
        rolling_code: u32,

        /// Starting key nibble
        #[arg(long, default_value = "0")]
        enc_key: u8,
    },

    /// List known shutters
    List,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "info,culbridge=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt().with_env_filter(filter).with_target(true).init();

    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = Config::builder()
        .transport_path(&args.cul)
        .baud_rate(args.baud)
        .state_dir(&args.state_dir)
        .build();

    match &args.command {
        Commands::Cover { name, command } => {
            let store = DeviceStateStore::open(&config.cover_state_dir())?;
            let address = store
                .resolve(name)
                .ok_or_else(|| BridgeError::UnknownDevice(name.clone()))?;
            let command = CoverCommand::from_payload(&command.to_ascii_uppercase())?;

            let mut transport = open_transport(&config)?;
            let sent = store.send_command(address, command, |frame| transport.write_frame(frame))?;

            println!(
                "{} {} (rolling code {}): {}",
                sent.sent_with.display_name,
                command,
                sent.sent_with.rolling_code,
                String::from_utf8_lossy(&sent.frame).trim_end()
            );
        }

        Commands::Switch {
            address,
            action,
            off_bits,
        } => {
            let action = SwitchAction::from_payload(&action.to_ascii_uppercase())?;
            let command = SwitchCommand::from_address(address, action)?;
            let frame = switch::encode(&command, *off_bits);

            let mut transport = open_transport(&config)?;
            transport.write_frame(&frame)?;
            println!("{}", String::from_utf8_lossy(&frame).trim_end());
        }

        Commands::Decode {
            frame,
            strict,
            weak_battery,
            off_bits,
        } => decode(frame, *strict, *weak_battery, *off_bits)?,

        Commands::Register {
            address,
            name,
            device_class,
            rolling_code,
            enc_key,
        } => {
            let store = DeviceStateStore::open(&config.cover_state_dir())?;
            let state = CoverDeviceState {
                address: parse_address(address)?,
                encryption_key_nibble: *enc_key,
                rolling_code: *rolling_code,
                device_class: device_class.clone(),
                display_name: name.clone(),
            };
            store.register(state)?;
            println!("registered {} as {:?}", address.to_ascii_uppercase(), name);
        }

        Commands::List => {
            let store = DeviceStateStore::open(&config.cover_state_dir())?;
            for state in store.devices() {
                println!(
                    "{}  key={:X}  code={:<8}  {:<10} {}",
                    state.address_hex(),
                    state.encryption_key_nibble,
                    state.rolling_code,
                    state.device_class,
                    state.display_name
                );
            }
            for path in store.corrupt_files() {
                println!("corrupt: {}", path.display());
            }
        }
    }

    Ok(())
}

fn open_transport(config: &Config) -> Result<SerialTransport> {
    SerialTransport::open(&config.transport_path, config.baud_rate, config.read_timeout_ms)
}

fn decode(frame: &str, strict: bool, weak_battery: WeakBattery, off_bits: OffBits) -> Result<()> {
    let frame = frame.trim();

    if frame.starts_with(sensor::FRAME_MARKER) {
        let policy = if strict { CrcPolicy::Strict } else { CrcPolicy::LogOnly };
        let decoded = sensor::decode_with(frame, policy, weak_battery)?;
        println!("sensor {}", decoded.reading.device_id);
        println!("  temperature: {:.1}", decoded.reading.temperature_celsius);
        match decoded.reading.humidity_percent {
            Some(h) => println!("  humidity:    {}", h),
            None => println!("  humidity:    -"),
        }
        println!("  battery:     {}", decoded.reading.battery_percent);
        println!("  crc:         {:?}", decoded.checksum);
    } else if frame.starts_with(cover::FRAME_PREFIX) {
        let decoded = cover::decode_frame(frame.as_bytes())?;
        println!("cover {:06X}", decoded.address);
        println!("  command:      {}", decoded.command);
        println!("  key:          {:X}", decoded.key_nibble);
        println!("  rolling code: {}", decoded.rolling_code);
    } else if frame.starts_with(switch::FRAME_PREFIX) {
        let decoded = switch::decode_frame(frame.as_bytes(), off_bits)?;
        println!("switch {}", decoded.address());
        println!("  action: {:?}", decoded.action);
    } else {
        return Err(BridgeError::MalformedFrame(format!("unrecognized frame {:?}", frame)));
    }

    Ok(())
}
