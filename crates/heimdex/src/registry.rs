//! 🗄️ The device registry cache — who lives here, and in which room.
//!
//! 🎬 Previously, on Heimdex...
//!
//! The events arrive speaking in serial numbers. `hdm:HomeMaticIP:3014F711A...`
//! means nothing to a human at 3am. "Radiator thermostat, bedroom" means
//! everything. The bridge between the two is a registry snapshot: a single JSON
//! file written by an external fetch process, mapping device ids to names and
//! rooms, and room ids to names.
//!
//! This module loads that file exactly once per cache lifetime and serves
//! synchronous lookups from memory. The cache is an explicit object — built by
//! whoever owns the process entry point and passed by reference into the
//! transformer. No module-level singleton, no hidden global, no 2am scavenger
//! hunt for where the state lives.
//!
//! ⚠️ Absence is not an error here. No file? No enrichment. Malformed file?
//! No enrichment. The pipeline keeps indexing either way, just with fewer
//! friendly names. Degraded, not dead. 🦆

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tracing::{debug, info, warn};

/// 🔌 What the registry knows about one device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceInfo {
    /// 🏷️ The human name. "Thermostat Wohnzimmer". The whole point of this module.
    pub name: String,
    /// 🔧 The device model/type string, when the fetcher recorded one.
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
    /// 🚪 Which room the device claims to live in. Resolves via [`RoomInfo`] — or doesn't.
    #[serde(rename = "roomId", default)]
    pub room_id: Option<String>,
}

/// 🚪 What the registry knows about one room.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomInfo {
    /// 🏷️ "Living Room", "Küche", "The Closet Of Forgotten Routers".
    pub name: String,
    /// 🎨 The icon the app shows. We carry it; we do not render it.
    #[serde(rename = "iconId", default)]
    pub icon_id: Option<String>,
}

/// 📦 One immutable snapshot of the registry file.
///
/// Loaded whole, shared behind an `Arc`, never mutated. If the fetch process
/// writes a new file, [`RegistryCache::invalidate`] is how you get a new one of
/// these. There is no automatic refresh mid-run — deliberate, documented, done.
#[derive(Debug, Default, Deserialize)]
pub struct RegistrySnapshot {
    /// ⏱️ When the external fetcher produced this snapshot. Informational only.
    #[serde(rename = "fetchedAt", default)]
    pub fetched_at: Option<String>,
    #[serde(default)]
    pub devices: HashMap<String, DeviceInfo>,
    #[serde(default)]
    pub rooms: HashMap<String, RoomInfo>,
}

/// 🔄 The three moods of the cache. Not-yet-asked, asked-and-absent, asked-and-present.
///
/// `Loaded(None)` matters: it remembers that the file was missing or malformed
/// so we don't re-read the disk on every lookup of every line of every file.
/// One read per lifetime. That is the contract.
#[derive(Debug)]
enum CacheState {
    Unloaded,
    Loaded(Option<Arc<RegistrySnapshot>>),
}

/// 🗄️ Lazily-loaded, explicitly-invalidatable registry cache.
///
/// Interior `RwLock` because the tokio runtime is multi-threaded and both
/// delivery modes consult the cache. Lookups after the first load are a read
/// lock and a `HashMap` probe — cheap enough to call once per event line.
#[derive(Debug)]
pub struct RegistryCache {
    /// 📂 Where the fetch process drops the snapshot file.
    path: PathBuf,
    state: RwLock<CacheState>,
}

impl RegistryCache {
    /// 🚀 Build a cache pointing at a registry file. No I/O happens here —
    /// the first lookup pays for the read. Constructors should be boring.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(CacheState::Unloaded),
        }
    }

    /// 📖 Load (or return the already-loaded) snapshot.
    ///
    /// Missing file → logged at info, remembered as absent. Malformed JSON →
    /// logged at warn, remembered as absent. Neither is an error: the pipeline
    /// must keep indexing with or without friendly names.
    pub fn load(&self) -> Option<Arc<RegistrySnapshot>> {
        // 🔓 Fast path: somebody already did the work. Read lock, clone the Arc, go.
        if let CacheState::Loaded(ref snapshot) = *self.state.read().expect("registry lock poisoned")
        {
            return snapshot.clone();
        }

        let mut state = self.state.write().expect("registry lock poisoned");
        // 🔒 Double-check under the write lock — another task may have loaded
        // while we were queueing for it.
        if let CacheState::Loaded(ref snapshot) = *state {
            return snapshot.clone();
        }

        let loaded = match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<RegistrySnapshot>(&raw) {
                Ok(snapshot) => {
                    debug!(
                        "🗄️ Registry loaded: {} devices, {} rooms (fetched at {:?})",
                        snapshot.devices.len(),
                        snapshot.rooms.len(),
                        snapshot.fetched_at
                    );
                    Some(Arc::new(snapshot))
                }
                Err(err) => {
                    // 💀 The file exists but the JSON inside has given up on itself.
                    warn!(
                        "💀 Registry file '{}' is not valid registry JSON ({err}). Proceeding without enrichment.",
                        self.path.display()
                    );
                    None
                }
            },
            Err(err) => {
                // 📭 No file is a normal Tuesday — the fetcher just hasn't run yet.
                info!(
                    "📭 No registry at '{}' ({err}). Events will be indexed without device/room names.",
                    self.path.display()
                );
                None
            }
        };

        *state = CacheState::Loaded(loaded.clone());
        loaded
    }

    /// 🔌 Look up a device by id. Triggers the lazy load on first call.
    pub fn lookup_device(&self, id: &str) -> Option<DeviceInfo> {
        self.load()?.devices.get(id).cloned()
    }

    /// 🚪 Look up a room by id. Triggers the lazy load on first call.
    pub fn lookup_room(&self, id: &str) -> Option<RoomInfo> {
        self.load()?.rooms.get(id).cloned()
    }

    /// 🗑️ Forget everything. The next lookup re-reads the file from disk.
    ///
    /// Exists for tests and for "the fetcher just wrote a fresh snapshot" hot
    /// reloads. Nothing calls this automatically.
    pub fn invalidate(&self) {
        *self.state.write().expect("registry lock poisoned") = CacheState::Unloaded;
    }

    /// 📂 The path this cache reads from. Handy for log lines and tests.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
