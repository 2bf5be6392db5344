//! Plaintext key-value store persisted as a single JSON file.
//!
//! Holds preferences, the session lease mirror and identity bindings. Nothing
//! written here is secret.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{PlatformError, Result};
use crate::traits::KeyValueStore;

/// Default file name inside the data directory.
pub const STATE_FILE_NAME: &str = "quickunlock-state.json";

/// [`KeyValueStore`] backed by one JSON object on disk.
///
/// The whole map is cached in memory and rewritten atomically (temp file +
/// rename) on every mutation, so a crash leaves either the old or the new
/// file, never a torn one.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing contents if the file exists.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    PlatformError::Encoding(format!("Failed to parse state file: {}", e))
                })?
            }
        } else {
            BTreeMap::new()
        };
        debug!("Opened state file {:?} with {} keys", path, entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Open `STATE_FILE_NAME` inside `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the file cannot be parsed.
    pub fn open_in(data_dir: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        Self::open(data_dir.as_ref().join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| PlatformError::Internal("State store mutex poisoned".into()))
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)?;

        // The rename is the commit point; nothing may fail after it.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let restrict = std::fs::metadata(&temp_path).and_then(|meta| {
                let mut perms = meta.permissions();
                perms.set_mode(0o600);
                std::fs::set_permissions(&temp_path, perms)
            });
            if let Err(e) = restrict {
                let _ = std::fs::remove_file(&temp_path);
                return Err(e.into());
            }
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&entries) {
            warn!("Failed to persist state key {}: {}", key, e);
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.lock()?;
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&entries) {
            warn!("Failed to persist removal of state key {}: {}", key, e);
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open_in(dir.path()).unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "two").unwrap();
        store.remove("a").unwrap();
        drop(store);

        let reopened = JsonFileStore::open_in(dir.path()).unwrap();
        assert_eq!(reopened.get("a").unwrap(), None);
        assert_eq!(reopened.get("b").unwrap(), Some("two".to_string()));
    }

    #[test]
    fn removing_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open_in(dir.path()).unwrap();
        store.remove("never-set").unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_FILE_NAME);
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(PlatformError::Encoding(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn state_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open_in(dir.path()).unwrap();
        store.set("k", "v").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn loose_state_file_is_replaced_by_a_private_one() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_FILE_NAME);
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        store.set("k", "v").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn failed_write_leaves_memory_and_disk_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open_in(dir.path()).unwrap();
        store.set("k", "old").unwrap();

        // A directory in place of the temp file makes the next write fail.
        std::fs::create_dir(store.path().with_extension("json.tmp")).unwrap();
        assert!(store.set("k", "new").is_err());
        assert_eq!(store.get("k").unwrap(), Some("old".to_string()));

        let reopened = JsonFileStore::open(store.path()).unwrap();
        assert_eq!(reopened.get("k").unwrap(), Some("old".to_string()));
    }
}
