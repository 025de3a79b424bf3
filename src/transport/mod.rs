//! Transport Module
//!
//! Line-oriented link to the CUL transceiver.
//!
//! ## Architecture
//! - One handle writes frames (owned by the router)
//! - A cloned handle reads RF lines (owned by the RF loop)
//! - An expired read timeout is "no frame", never an error
//! - Unterminated input is capped at [`MAX_PENDING`] bytes

mod lines;
mod serial;

pub use lines::{LineBuffer, MAX_PENDING};
pub use serial::SerialTransport;

use crate::error::Result;

/// Byte link to the transceiver
pub trait Transport: Send {
    /// Write one complete frame and flush it
    fn write_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Read the next line, without its terminator
    ///
    /// Returns `Ok(None)` when the read timeout expires first.
    fn read_line(&mut self) -> Result<Option<String>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        (**self).read_line()
    }
}
