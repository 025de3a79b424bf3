//! Error types for culbridge
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type for culbridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Addressing / Routing Errors
    // -------------------------------------------------------------------------
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    // -------------------------------------------------------------------------
    // Frame Decoding Errors
    // -------------------------------------------------------------------------
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Bad start marker in frame {0}")]
    BadStartMarker(String),

    #[error("Checksum mismatch: received 0x{received:02X}, calculated 0x{calculated:02X}")]
    ChecksumMismatch { received: u8, calculated: u8 },

    // -------------------------------------------------------------------------
    // State / Transport Errors
    // -------------------------------------------------------------------------
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Bus error: {0}")]
    Bus(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
