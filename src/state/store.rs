//! Device State Store
//!
//! Owns every shutter record and is the only writer of the state files.
//!
//! ## Responsibilities
//! - Discover existing records on startup
//! - Register new shutters
//! - Serialize read → advance → persist per device
//! - Replace records atomically so a crash leaves either the old or the new file

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{BridgeError, Result};

use crate::protocol::cover::{self, CoverCommand};

use super::{parse_address, CoverDeviceState, Transmission};

/// A record plus the file it lives in
struct DeviceSlot {
    path: PathBuf,
    state: CoverDeviceState,
}

/// Exclusive handle on one device, valid inside [`DeviceStateStore::with_device`]
pub struct DeviceRecord<'a> {
    slot: &'a mut DeviceSlot,
}

impl DeviceRecord<'_> {
    /// Current (last persisted) state
    pub fn state(&self) -> &CoverDeviceState {
        &self.slot.state
    }

    /// File backing this record
    pub fn path(&self) -> &Path {
        &self.slot.path
    }

    /// Persist `next` and make it the current state
    ///
    /// On error the in-memory state is left untouched.
    pub fn commit(&mut self, next: CoverDeviceState) -> Result<()> {
        if next.address != self.slot.state.address {
            return Err(BridgeError::PersistenceFailure(format!(
                "refusing to move record {} to address {}",
                self.slot.state.address_hex(),
                next.address_hex()
            )));
        }
        next.validate()?;
        write_atomic(&self.slot.path, &next)?;
        self.slot.state = next;
        Ok(())
    }
}

/// Durable store of shutter state
///
/// ## Concurrency:
/// - `devices`: RwLock over the map, only written by `register`
/// - each device sits behind its own Mutex, held for the whole of
///   `with_device`, so two increments for one shutter never interleave
pub struct DeviceStateStore {
    /// Directory holding the JSON records
    dir: PathBuf,

    /// Records keyed by address
    devices: RwLock<BTreeMap<u32, Arc<Mutex<DeviceSlot>>>>,

    /// Files that failed to load
    corrupt: Vec<PathBuf>,
}

impl DeviceStateStore {
    const EXTENSION: &'static str = "json";
    const TEMP_SUFFIX: &'static str = "tmp";

    /// Open or create the store in `dir`
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Load every `*.json` record
    /// 3. Skip (and remember) records that are unreadable or out of range
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            BridgeError::PersistenceFailure(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let mut devices = BTreeMap::new();
        let mut corrupt = Vec::new();

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == Self::EXTENSION))
            .collect();
        paths.sort();

        for path in paths {
            match Self::load_record(&path) {
                Ok(state) if devices.contains_key(&state.address) => {
                    tracing::error!(
                        path = %path.display(),
                        address = %state.address_hex(),
                        "duplicate cover address, record skipped"
                    );
                    corrupt.push(path);
                }
                Ok(state) => {
                    tracing::debug!(
                        address = %state.address_hex(),
                        name = %state.display_name,
                        rolling_code = state.rolling_code,
                        "loaded cover state"
                    );
                    devices.insert(state.address, Arc::new(Mutex::new(DeviceSlot { path, state })));
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "corrupt cover state, record skipped");
                    corrupt.push(path);
                }
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            devices: RwLock::new(devices),
            corrupt,
        })
    }

    /// Create a record for a shutter that has none yet
    pub fn register(&self, state: CoverDeviceState) -> Result<()> {
        state.validate()?;

        let mut devices = self.devices.write();
        if devices.contains_key(&state.address) {
            return Err(BridgeError::InvalidAddress(format!(
                "cover {} is already registered",
                state.address_hex()
            )));
        }

        let path = self.record_path(state.address);
        if path.exists() {
            return Err(BridgeError::PersistenceFailure(format!(
                "{} exists but was not loaded",
                path.display()
            )));
        }

        write_atomic(&path, &state)?;
        tracing::info!(address = %state.address_hex(), name = %state.display_name, "registered cover");
        devices.insert(state.address, Arc::new(Mutex::new(DeviceSlot { path, state })));
        Ok(())
    }

    /// Run `f` with exclusive access to one device
    pub fn with_device<F, R>(&self, address: u32, f: F) -> Result<R>
    where
        F: FnOnce(&mut DeviceRecord<'_>) -> Result<R>,
    {
        let slot = self
            .devices
            .read()
            .get(&address)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownDevice(format!("{:06X}", address)))?;

        let mut guard = slot.lock();
        let mut record = DeviceRecord { slot: &mut *guard };
        f(&mut record)
    }

    /// Advance and persist one device's rolling code and key nibble
    ///
    /// Returns the new state.
    pub fn increase_rolling_code(&self, address: u32) -> Result<CoverDeviceState> {
        self.with_device(address, |record| {
            let next = record.state().advanced();
            record.commit(next.clone())?;
            Ok(next)
        })
    }

    /// Encode `command` for one device, persist the advanced state, then hand
    /// the frame to `send`
    ///
    /// The device stays locked for the whole sequence. If persisting fails
    /// nothing is sent; if `send` fails the code is still consumed, so a
    /// restart can never reuse a code that may have reached the air.
    pub fn send_command<F>(&self, address: u32, command: CoverCommand, send: F) -> Result<Transmission>
    where
        F: FnOnce(&[u8]) -> Result<()>,
    {
        self.with_device(address, |record| {
            let sent_with = record.state().clone();
            let (frame, next) = cover::encode(command, &sent_with);

            record.commit(next)?;
            tracing::debug!(
                address = %sent_with.address_hex(),
                rolling_code = sent_with.rolling_code,
                "cover state persisted"
            );

            send(&frame)?;
            Ok(Transmission { frame, sent_with })
        })
    }

    /// Find a device by display name, then by hex address
    pub fn resolve(&self, name: &str) -> Option<u32> {
        let devices = self.devices.read();
        let by_name = devices
            .iter()
            .find(|(_, slot)| slot.lock().state.display_name == name)
            .map(|(address, _)| *address);

        by_name.or_else(|| {
            parse_address(name)
                .ok()
                .filter(|address| devices.contains_key(address))
        })
    }

    /// Snapshot of one device
    pub fn get(&self, address: u32) -> Option<CoverDeviceState> {
        let slot = self.devices.read().get(&address).cloned()?;
        let state = slot.lock().state.clone();
        Some(state)
    }

    /// Snapshot of all devices, ordered by address
    pub fn devices(&self) -> Vec<CoverDeviceState> {
        self.devices
            .read()
            .values()
            .map(|slot| slot.lock().state.clone())
            .collect()
    }

    /// Number of loaded devices
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Files skipped at open because they could not be trusted
    pub fn corrupt_files(&self) -> &[PathBuf] {
        &self.corrupt
    }

    /// Directory holding the records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn record_path(&self, address: u32) -> PathBuf {
        self.dir.join(format!("{:06X}.{}", address, Self::EXTENSION))
    }

    fn load_record(path: &Path) -> Result<CoverDeviceState> {
        let text = fs::read_to_string(path)?;
        let state: CoverDeviceState = serde_json::from_str(&text)?;
        state.validate()?;
        Ok(state)
    }
}

/// Replace `path` with `state` so that a crash leaves either version intact
fn write_atomic(path: &Path, state: &CoverDeviceState) -> Result<()> {
    let persist_err = |what: &str, e: std::io::Error| {
        BridgeError::PersistenceFailure(format!("{} {}: {}", what, path.display(), e))
    };

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".");
    temp_name.push(DeviceStateStore::TEMP_SUFFIX);
    let temp_path = PathBuf::from(temp_name);

    let body = serde_json::to_vec_pretty(state)?;
    {
        let mut file = File::create(&temp_path).map_err(|e| persist_err("create temp for", e))?;
        file.write_all(&body).map_err(|e| persist_err("write", e))?;
        file.write_all(b"\n").map_err(|e| persist_err("write", e))?;
        file.sync_all().map_err(|e| persist_err("sync", e))?;
    }
    fs::rename(&temp_path, path).map_err(|e| persist_err("rename onto", e))?;
    sync_parent(path).map_err(|e| persist_err("sync directory of", e))
}

/// Make the rename itself durable
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => File::open(parent)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
