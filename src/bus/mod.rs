//! Bus Module
//!
//! Publish/subscribe side of the bridge.
//!
//! ## Responsibilities
//! - `Bus`: publish state, open subscriptions
//! - `MessageSource`: blocking stream of inbound command messages
//! - MQTT topic-filter matching (`+`, `#`)

mod mosquitto;

use std::borrow::Cow;

use crossbeam::channel::Receiver;

use crate::error::Result;

pub use mosquitto::{MosquittoBus, MosquittoSubscription};

/// One message as seen on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text (lossy)
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Parse a `topic hexpayload` line as printed by the subscription client
    ///
    /// The payload is hex encoded, so it never contains a space or a line
    /// break; the topic is everything before the last space. Returns `None`
    /// for a line whose topic is not UTF-8 or whose payload is not hex.
    pub fn parse_line(line: &[u8]) -> Option<Self> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let split = line.iter().rposition(|&b| b == b' ');
        let (topic, payload) = match split {
            Some(at) => (&line[..at], &line[at + 1..]),
            None => (line, &b""[..]),
        };
        let topic = std::str::from_utf8(topic).ok()?;
        if topic.is_empty() {
            return None;
        }
        let payload = hex::decode(payload).ok()?;
        Some(Self::new(topic, payload))
    }
}

/// Message bus client
pub trait Bus: Send + Sync {
    /// Publish `payload` on `topic`
    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<()>;

    /// Start receiving messages matching `pattern`
    fn subscribe(&self, pattern: &str) -> Result<Box<dyn MessageSource>>;
}

/// Blocking stream of inbound messages
pub trait MessageSource: Send {
    /// Next message, or `Ok(None)` once the subscription is closed
    fn next_message(&mut self) -> Result<Option<BusMessage>>;
}

/// Messages delivered through a crossbeam channel
///
/// The subscription closes when every sender is dropped.
pub struct ChannelSource {
    receiver: Receiver<BusMessage>,
}

impl ChannelSource {
    pub fn new(receiver: Receiver<BusMessage>) -> Self {
        Self { receiver }
    }
}

impl MessageSource for ChannelSource {
    fn next_message(&mut self) -> Result<Option<BusMessage>> {
        Ok(self.receiver.recv().ok())
    }
}

/// Whether `topic` matches the MQTT subscription `filter`
///
/// `+` matches exactly one level, a trailing `#` matches the parent level
/// and everything below it.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
