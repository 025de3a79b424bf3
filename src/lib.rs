//! # culbridge
//!
//! A bridge between a CUL RF transceiver and an MQTT broker:
//! - Intertechno switches and Somfy RTS shutters driven from bus commands
//! - LaCrosse IT+ sensor beacons published as JSON state
//! - Crash-safe rolling-code persistence (persist, then transmit)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MQTT Broker (Bus)                        │
//! │        {prefix}/{type}/{component}/{name}[/set]              │
//! └──────────────┬─────────────────────────────▲────────────────┘
//!                │ commands                    │ sensor state
//! ┌──────────────▼─────────────────────────────┴────────────────┐
//! │                         Router                               │
//! │            (topic parsing, protocol dispatch)                │
//! └──────┬──────────────────┬──────────────────────▲────────────┘
//!        │                  │                      │
//!        ▼                  ▼                      │
//!  ┌───────────┐    ┌──────────────┐       ┌──────────────┐
//!  │  Switch   │    │    Cover     │       │    Sensor    │
//!  │  encoder  │    │   encoder    │       │   decoder    │
//!  └─────┬─────┘    └──────┬───────┘       └──────▲───────┘
//!        │                 │  ▲                   │
//!        │                 ▼  │                   │
//!        │          ┌──────────────┐              │
//!        │          │ State Store  │              │
//!        │          │ (JSON files) │              │
//!        │          └──────────────┘              │
//!        ▼                                        │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Transport (CUL serial line)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod checksum;
pub mod protocol;
pub mod state;
pub mod registry;
pub mod transport;
pub mod bus;
pub mod router;
pub mod bridge;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BridgeError, Result};
pub use config::Config;
pub use router::Router;
pub use state::DeviceStateStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of culbridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
