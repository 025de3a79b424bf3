//! Mosquitto client bus
//!
//! Drives the broker through the `mosquitto_sub` / `mosquitto_pub`
//! command-line clients: one long-lived `mosquitto_sub` per subscription,
//! one `mosquitto_pub` per published message.
//!
//! ## Subscription output
//! ```text
//! homeconnect/cover/somfy/Kitchen/set 4f50454e\n
//! └──────────── topic ──────────────┘ └ hex ─┘
//! ```
//! Payloads are printed hex encoded (`-F "%t %x"`), so binary payloads and
//! payloads containing line breaks stay on one line.
//!
//! ## Credentials
//! Login details never go on a command line. They are written to
//! `{state_dir}/mqtt/mosquitto_sub` and `.../mosquitto_pub` (mode 0600),
//! which the clients read as their options file when `XDG_CONFIG_HOME`
//! points at that directory.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::config::{BusCredentials, Config};
use crate::error::{BridgeError, Result};

use super::{topic_matches, Bus, BusMessage, MessageSource};

/// Output format handed to `mosquitto_sub -F`
pub const SUBSCRIPTION_FORMAT: &str = "%t %x\\n";

/// Broker connection settings plus the client programs to run
#[derive(Debug, Clone)]
pub struct MosquittoBus {
    host: String,
    port: u16,
    /// Directory holding the client options files, when logging in
    options_dir: Option<PathBuf>,
    sub_program: String,
    pub_program: String,
}

impl MosquittoBus {
    /// Bus for the broker in `config`
    ///
    /// With credentials configured this writes the client options files
    /// under `{state_dir}/mqtt/`.
    pub fn new(config: &Config) -> Result<Self> {
        let options_dir = match &config.bus_credentials {
            Some(credentials) => {
                let dir = config.state_dir.join("mqtt");
                write_options_files(&dir, credentials)?;
                Some(dir)
            }
            None => None,
        };

        Ok(Self {
            host: config.bus_host.clone(),
            port: config.bus_port,
            options_dir,
            sub_program: "mosquitto_sub".to_string(),
            pub_program: "mosquitto_pub".to_string(),
        })
    }

    /// Use different client executables (e.g. absolute paths)
    pub fn with_programs(mut self, sub_program: impl Into<String>, pub_program: impl Into<String>) -> Self {
        self.sub_program = sub_program.into();
        self.pub_program = pub_program.into();
        self
    }

    /// Arguments shared by both clients
    pub fn connection_args(&self) -> Vec<String> {
        vec![
            "-h".to_string(),
            self.host.clone(),
            "-p".to_string(),
            self.port.to_string(),
        ]
    }

    /// Directory the clients read their login from
    pub fn options_dir(&self) -> Option<&Path> {
        self.options_dir.as_deref()
    }

    fn command(&self, program: &str) -> Command {
        let mut command = Command::new(program);
        command.args(self.connection_args());
        if let Some(dir) = &self.options_dir {
            command.env("XDG_CONFIG_HOME", dir);
        }
        command
    }
}

/// Write one options file per client, readable by the owner only
fn write_options_files(dir: &Path, credentials: &BusCredentials) -> Result<()> {
    let fields = [&credentials.username, &credentials.password];
    if fields.iter().any(|f| f.contains(['\n', '\r'])) {
        return Err(BridgeError::Config(
            "broker username and password must be single-line".to_string(),
        ));
    }
    let contents = format!("-u {}\n-P {}\n", credentials.username, credentials.password);

    fs::create_dir_all(dir)?;
    restrict(dir, 0o700)?;

    for client in ["mosquitto_sub", "mosquitto_pub"] {
        let path = dir.join(client);
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        // A pre-existing file keeps its old mode through `open`
        restrict(&path, 0o600)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }

    tracing::debug!(dir = %dir.display(), "wrote broker login options");
    Ok(())
}

#[cfg(unix)]
fn restrict(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

impl Bus for MosquittoBus {
    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<()> {
        let mut command = self.command(&self.pub_program);
        command
            .args(["-t", topic, "-s"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null());
        if retain {
            command.arg("-r");
        }

        let mut child = command
            .spawn()
            .map_err(|e| BridgeError::Bus(format!("cannot start {}: {}", self.pub_program, e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(payload)?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(BridgeError::Bus(format!(
                "{} exited with {} publishing {}",
                self.pub_program, status, topic
            )));
        }

        tracing::trace!(topic, retain, bytes = payload.len(), "published");
        Ok(())
    }

    fn subscribe(&self, pattern: &str) -> Result<Box<dyn MessageSource>> {
        let mut child = self
            .command(&self.sub_program)
            .args(["-N", "-F", SUBSCRIPTION_FORMAT, "-t", pattern])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| BridgeError::Bus(format!("cannot start {}: {}", self.sub_program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Bus(format!("{} has no stdout", self.sub_program)))?;

        tracing::info!(host = %self.host, port = self.port, pattern, "subscribed");
        Ok(Box::new(MosquittoSubscription {
            child,
            lines: BufReader::new(stdout),
            pattern: pattern.to_string(),
        }))
    }
}

/// A running `mosquitto_sub`; killed on drop
pub struct MosquittoSubscription {
    child: Child,
    lines: BufReader<ChildStdout>,
    pattern: String,
}

impl MessageSource for MosquittoSubscription {
    /// Next matching message
    ///
    /// Lines that do not decode are logged and skipped. Only a failed read
    /// of the client's output is an error.
    fn next_message(&mut self) -> Result<Option<BusMessage>> {
        let mut line = Vec::new();
        loop {
            line.clear();
            if self.lines.read_until(b'\n', &mut line)? == 0 {
                return Ok(None);
            }
            match BusMessage::parse_line(&line) {
                Some(message) if topic_matches(&self.pattern, &message.topic) => {
                    return Ok(Some(message))
                }
                _ => {
                    let text = String::from_utf8_lossy(&line);
                    tracing::debug!(line = %text.trim_end(), "skipping subscription line");
                }
            }
        }
    }
}

impl Drop for MosquittoSubscription {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
