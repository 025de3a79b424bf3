//! Known device registry
//!
//! Sensor ids that have already been announced during this process
//! lifetime. Never persisted: a restart announces every sensor once more.

use std::collections::HashSet;

use parking_lot::Mutex;

/// Set of sensor ids seen since startup
#[derive(Debug, Default)]
pub struct KnownDeviceRegistry {
    seen: Mutex<HashSet<u8>>,
}

impl KnownDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `device_id` as seen
    ///
    /// Returns `true` the first time an id is marked, i.e. when the caller
    /// should announce the device.
    pub fn mark_seen(&self, device_id: u8) -> bool {
        self.seen.lock().insert(device_id)
    }

    pub fn is_known(&self, device_id: u8) -> bool {
        self.seen.lock().contains(&device_id)
    }

    /// Ids seen so far, ascending
    pub fn known(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.seen.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
