//! Local key-value cache: one JSON file per key under a data directory.
//!
//! This is the durable per-device cache the legacy deployment kept in
//! browser localStorage. Operations are synchronous and deliberately
//! forgiving: a read of malformed JSON falls back to "absent" and a failed
//! write is logged and reported through a `bool` the caller is free to
//! ignore. In-memory state stays authoritative either way.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

/// The cache keys, preserved verbatim from the legacy deployment so an
/// upgraded install keeps its data.
pub mod keys {
    /// Mirrored shop settings record.
    pub const SETTINGS: &str = "barbershopSettings";
    /// Mirrored contact list.
    pub const CONTACTS: &str = "barbershopContacts";
    /// Mirrored gallery.
    pub const GALLERY: &str = "barbershopGallery";
    /// Mirrored background record.
    pub const BACKGROUND: &str = "barbershopBackground";
    /// Board snapshot (waiting count + chair map + timestamp).
    pub const BOARD_STATE: &str = "barbershopState";
    /// Device-local language preference, never synced.
    pub const LANG: &str = "barbershopLang";

    /// Millis of the last coarse record refresh.
    pub const LAST_SYSTEM_UPDATE: &str = "lastSystemUpdate";
    /// Millis of the last explicit update check.
    pub const LAST_UPDATE_CHECK: &str = "lastUpdateCheck";
    /// Millis stamped by a force-update for same-host instances to notice.
    pub const LAST_GLOBAL_UPDATE: &str = "lastGlobalUpdate";
    /// The `lastGlobalUpdate` value this instance has already handled.
    pub const MY_LAST_UPDATE: &str = "myLastUpdate";
    /// Millis of the last debounced full reload.
    pub const LAST_FULL_RELOAD: &str = "lastFullReload";
    /// Millis stamped whenever a force-update is pushed.
    pub const FORCE_REFRESH_ALL: &str = "forceRefreshAll";
    /// Set while the background refresh tasks are running.
    pub const AUTO_REFRESH_ACTIVE: &str = "autoRefreshActive";
    /// This device's session id (`user_` + nine base-36 characters).
    pub const USER_SESSION_ID: &str = "userSessionId";
}

/// Errors opening the cache directory. Individual reads and writes never
/// surface errors; see the module docs.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("cannot create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Key-value cache over a directory of JSON files.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) the cache directory.
    ///
    /// # Errors
    ///
    /// Returns [`LocalStoreError::CreateDir`] when the directory cannot be
    /// created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| LocalStoreError::CreateDir {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    fn file_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Read and decode a key. Missing files and malformed JSON both come
    /// back as `None` (malformed content is logged).
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.file_for(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, error = %e, "failed to read cache entry");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "malformed cache entry, treating as absent");
                None
            }
        }
    }

    /// Encode and write a key. Returns whether the write landed; a failure
    /// is logged and never propagates.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let path = self.file_for(key);
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache entry");
                return false;
            }
        };
        match write_atomic(&path, &bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "failed to write cache entry");
                false
            }
        }
    }

    /// Delete a key's backing file, ignoring absence.
    pub fn remove(&self, key: &str) {
        if let Err(e) = std::fs::remove_file(self.file_for(key))
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(key, error = %e, "failed to remove cache entry");
        }
    }

    /// Read a millis-valued bookkeeping marker.
    #[must_use]
    pub fn get_millis(&self, key: &str) -> Option<i64> {
        self.get(key)
    }

    /// Write a millis-valued bookkeeping marker.
    pub fn set_millis(&self, key: &str, millis: i64) -> bool {
        self.set(key, &millis)
    }
}

/// Write via a sibling temp file and rename so a crash mid-write never
/// leaves a half-written entry behind.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use barberboard_core::ShopSettings;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_key_is_none() {
        let (_dir, store) = store();
        assert!(store.get::<ShopSettings>(keys::SETTINGS).is_none());
    }

    #[test]
    fn test_set_then_get_roundtrip() {
        let (_dir, store) = store();
        let settings = ShopSettings {
            chair_count: 5,
            ..ShopSettings::default()
        };
        assert!(store.set(keys::SETTINGS, &settings));
        assert_eq!(store.get::<ShopSettings>(keys::SETTINGS), Some(settings));
    }

    #[test]
    fn test_malformed_json_is_treated_as_absent() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("barbershopSettings.json"), b"{not json").unwrap();
        assert!(store.get::<ShopSettings>(keys::SETTINGS).is_none());
    }

    #[test]
    fn test_remove_ignores_absence() {
        let (_dir, store) = store();
        store.remove(keys::LANG);
        store.set(keys::LANG, &"ar");
        store.remove(keys::LANG);
        assert!(store.get::<String>(keys::LANG).is_none());
    }

    #[test]
    fn test_millis_markers() {
        let (_dir, store) = store();
        assert!(store.get_millis(keys::LAST_FULL_RELOAD).is_none());
        assert!(store.set_millis(keys::LAST_FULL_RELOAD, 1_700_000_000_000));
        assert_eq!(
            store.get_millis(keys::LAST_FULL_RELOAD),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn test_open_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = LocalStore::open(&nested).unwrap();
        assert!(store.set("probe", &1_i64));
        assert!(nested.join("probe.json").exists());
    }
}
