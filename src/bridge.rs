//! Bridge
//!
//! Runs the two listener loops around a shared [`Router`].
//!
//! ```text
//!   ┌──────────────┐   lines    ┌──────────┐  publish   ┌─────────┐
//!   │ rf-listener  │ ─────────▶ │          │ ─────────▶ │         │
//!   │ (transport)  │            │  Router  │            │   Bus   │
//!   │              │ ◀───────── │          │ ◀───────── │         │
//!   └──────────────┘   frames   └──────────┘  messages  └─────────┘
//!                                    ▲
//!                         bus-listener (subscription)
//! ```
//!
//! A failure while handling a single line or message is logged and the
//! loop moves on. Only a broken transport or a closed subscription ends a
//! loop, and the first loop to end stops the bridge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel;

use crate::bus::MessageSource;
use crate::error::{BridgeError, Result};
use crate::router::{Dispatch, Inbound, Router};
use crate::transport::Transport;

/// Which listener loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    Rf,
    Bus,
}

/// Owns the listener threads
pub struct Bridge {
    router: Arc<Router>,
    stop: Arc<AtomicBool>,
}

impl Bridge {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that asks both loops to end
    ///
    /// The RF loop notices it after its next read timeout. The bus loop
    /// notices it after its next message.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Start the transceiver, spawn both loops, and block until one ends
    ///
    /// Returns the ending loop together with its result. When the bus loop
    /// ends first, the RF loop is stopped and joined. A bus subscription
    /// blocked in a read cannot be interrupted, so when the RF loop ends
    /// first the bus thread is left to the process exit.
    pub fn run(
        &self,
        rf: Box<dyn Transport>,
        source: Box<dyn MessageSource>,
    ) -> Result<(Listener, Result<()>)> {
        self.router.start()?;

        let (done_tx, done_rx) = channel::bounded::<(Listener, Result<()>)>(2);

        let rf_handle = {
            let router = Arc::clone(&self.router);
            let stop = Arc::clone(&self.stop);
            let done = done_tx.clone();
            thread::Builder::new()
                .name("rf-listener".to_string())
                .spawn(move || {
                    let result = rf_loop(&router, rf, &stop);
                    let _ = done.send((Listener::Rf, result));
                })?
        };

        {
            let router = Arc::clone(&self.router);
            let stop = Arc::clone(&self.stop);
            let done = done_tx;
            thread::Builder::new()
                .name("bus-listener".to_string())
                .spawn(move || {
                    let result = bus_loop(&router, source, &stop);
                    let _ = done.send((Listener::Bus, result));
                })?;
        }

        tracing::info!("bridge running");

        let (listener, result) = done_rx
            .recv()
            .map_err(|_| BridgeError::Bus("listener threads vanished".to_string()))?;
        self.stop.store(true, Ordering::SeqCst);

        match &result {
            Ok(()) => tracing::info!(?listener, "listener finished"),
            Err(e) => tracing::error!(?listener, error = %e, "listener failed"),
        }

        if listener == Listener::Bus && rf_handle.join().is_err() {
            tracing::error!("rf-listener panicked");
        }

        Ok((listener, result))
    }
}

// =============================================================================
// Listener Loops
// =============================================================================

/// Feed transceiver lines to the router until `stop` is set or the
/// transport fails
pub fn rf_loop(router: &Router, mut rf: Box<dyn Transport>, stop: &AtomicBool) -> Result<()> {
    while !stop.load(Ordering::SeqCst) {
        let line = match rf.read_line()? {
            Some(line) => line,
            None => continue,
        };
        tracing::trace!(line = %line.trim_end(), "rf line");

        match router.handle_rf_line(&line) {
            Ok(Inbound::Reading(event)) => {
                tracing::debug!(topic = %event.topic, announce = event.announce, "published reading");
            }
            Ok(Inbound::Empty) | Ok(Inbound::Unhandled) => {}
            Err(e) => tracing::warn!(line = %line.trim_end(), error = %e, "dropping RF line"),
        }
    }
    Ok(())
}

/// Feed bus messages to the router until `stop` is set or the
/// subscription closes
pub fn bus_loop(
    router: &Router,
    mut source: Box<dyn MessageSource>,
    stop: &AtomicBool,
) -> Result<()> {
    while !stop.load(Ordering::SeqCst) {
        let message = match source.next_message()? {
            Some(message) => message,
            None => {
                tracing::info!("bus subscription closed");
                return Ok(());
            }
        };
        let payload = message.payload_str();
        tracing::trace!(topic = %message.topic, %payload, "bus message");

        match router.handle_message(&message) {
            Ok(Dispatch::Transmitted { protocol, frame }) => {
                let frame = String::from_utf8_lossy(&frame);
                tracing::debug!(%protocol, frame = %frame.trim_end(), "frame transmitted");
            }
            Ok(Dispatch::Ignored(reason)) => {
                tracing::trace!(topic = %message.topic, ?reason, "message ignored");
            }
            Err(e) => tracing::error!(topic = %message.topic, error = %e, "command failed"),
        }
    }
    Ok(())
}
