//! Serial Transport
//!
//! Talks culfw over a USB serial port.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::error::{BridgeError, Result};

use super::{LineBuffer, Transport};

/// CUL stick on a serial port
pub struct SerialTransport {
    /// Open port (read timeout configured at open)
    port: Box<dyn SerialPort>,

    /// Bytes received after the last complete line
    pending: LineBuffer,

    /// Device path for logging
    path: String,
}

impl SerialTransport {
    const READ_CHUNK: usize = 64;

    /// Open `path` at `baud_rate`; reads give up after `read_timeout_ms`
    pub fn open(path: &str, baud_rate: u32, read_timeout_ms: u64) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(read_timeout_ms))
            .open()
            .map_err(|e| BridgeError::TransportFailure(format!("cannot open {}: {}", path, e)))?;

        tracing::debug!(path, baud_rate, read_timeout_ms, "serial port opened");

        Ok(Self {
            port,
            pending: LineBuffer::new(),
            path: path.to_string(),
        })
    }

    /// Second handle on the same port, for a reader thread
    pub fn try_clone(&self) -> Result<Self> {
        let port = self.port.try_clone().map_err(|e| {
            BridgeError::TransportFailure(format!("cannot clone {}: {}", self.path, e))
        })?;
        Ok(Self {
            port,
            pending: LineBuffer::new(),
            path: self.path.clone(),
        })
    }

    /// Ask the firmware for its version string
    pub fn firmware_version(&mut self) -> Result<Option<String>> {
        self.write_frame(b"V\n")?;
        self.read_line()
    }

    /// Get the device path
    pub fn path(&self) -> &str {
        &self.path
    }

}

impl Transport for SerialTransport {
    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.port
            .write_all(frame)
            .and_then(|_| self.port.flush())
            .map_err(|e| BridgeError::TransportFailure(format!("write to {}: {}", self.path, e)))
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut chunk = [0u8; Self::READ_CHUNK];
        loop {
            if let Some(line) = self.pending.take_line() {
                return Ok(Some(line));
            }

            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.push(&chunk[..n]),
                // Timeout (Windows uses TimedOut, unix WouldBlock on some drivers)
                Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None)
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(BridgeError::TransportFailure(format!(
                        "read from {}: {}",
                        self.path, e
                    )))
                }
            }
        }
    }
}
