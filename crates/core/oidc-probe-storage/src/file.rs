//! Directory-backed key-value store.

use crate::{KeyValueStore, StorageError, StorageResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One file per key under a root directory.
///
/// File names are the base64url encoding of the key, so arbitrary keys
/// (colons, dots, slashes) round-trip and stay enumerable for prefix
/// deletion.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the platform config directory
    /// (`~/.config/oidc-probe/storage` on Linux).
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| StorageError::Unavailable("no config directory".to_string()))?;
        Ok(Self::new(base.join("oidc-probe").join("storage")))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(URL_SAFE_NO_PAD.encode(key))
    }

    fn decode_name(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let bytes = URL_SAFE_NO_PAD.decode(name).ok()?;
        String::from_utf8(bytes).ok()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            match Self::decode_name(&path) {
                Some(key) => keys.push(key),
                None => warn!(?path, "skipping undecodable storage entry"),
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("oidc.user:https://idp/realms/x:app1", "{}").unwrap();
        assert_eq!(
            store
                .get("oidc.user:https://idp/realms/x:app1")
                .unwrap()
                .as_deref(),
            Some("{}")
        );

        let keys = store.keys().unwrap();
        assert_eq!(keys, vec!["oidc.user:https://idp/realms/x:app1"]);
    }

    #[test]
    fn missing_key_is_none_and_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert_eq!(store.get("nothing").unwrap(), None);
        store.remove("nothing").unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn prefix_removal_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("oidc.a", "1").unwrap();
        store.set("oidc.b", "2").unwrap();
        store.set("oidc_debug_settings", "3").unwrap();

        store.remove_prefix("oidc.").unwrap();

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["oidc_debug_settings"]);
    }
}
