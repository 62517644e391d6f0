//! Durable session keys.
//!
//! Two scalar keys survive reloads:
//! - `has_pol_wallet`: a provider was detected at least once (sticky `"true"`)
//! - `connected_wallet`: last successful canonical address, removed on disconnect

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::StoreError;

pub const HAS_WALLET_KEY: &str = "has_pol_wallet";
pub const CONNECTED_KEY: &str = "connected_wallet";

/// String key/value persistence (localStorage semantics).
pub trait SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use file::{session_path, FileStore, ROOT_ENV};

#[cfg(feature = "native")]
mod file {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    pub const ROOT_ENV: &str = "POLCONNECT_ROOT";

    /// `<root>/<app>/data/session.json`, root from `POLCONNECT_ROOT` or the platform data dir.
    pub fn session_path(app: &str) -> PathBuf {
        let root = std::env::var(ROOT_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")));
        root.join(app).join("data").join("session.json")
    }

    /// JSON object on disk, rewritten on every change.
    #[derive(Debug, Clone)]
    pub struct FileStore {
        path: PathBuf,
    }

    impl FileStore {
        pub fn open(app: &str) -> Self { Self::at(session_path(app)) }

        pub fn at(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

        pub fn path(&self) -> &Path { &self.path }

        fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
            if !self.path.exists() {
                return Ok(BTreeMap::new());
            }
            let raw = std::fs::read_to_string(&self.path)?;
            Ok(serde_json::from_str(&raw)?)
        }

        fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
            Ok(())
        }
    }

    impl SessionStore for FileStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.load()?.remove(key))
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            let mut entries = self.load()?;
            entries.insert(key.to_string(), value.to_string());
            self.save(&entries)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            let mut entries = self.load()?;
            if entries.remove(key).is_some() {
                self.save(&entries)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(HAS_WALLET_KEY).unwrap(), None);
        store.set(HAS_WALLET_KEY, "true").unwrap();
        assert_eq!(store.get(HAS_WALLET_KEY).unwrap().as_deref(), Some("true"));
        store.remove(HAS_WALLET_KEY).unwrap();
        assert_eq!(store.get(HAS_WALLET_KEY).unwrap(), None);
    }

    #[cfg(feature = "native")]
    #[test]
    fn file_store_persists_across_handles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app").join("data").join("session.json");
        FileStore::at(&path).set(CONNECTED_KEY, "pol_abc").unwrap();

        let reopened = FileStore::at(&path);
        assert_eq!(reopened.get(CONNECTED_KEY).unwrap().as_deref(), Some("pol_abc"));
        reopened.remove(CONNECTED_KEY).unwrap();
        assert_eq!(FileStore::at(&path).get(CONNECTED_KEY).unwrap(), None);
    }

    #[cfg(feature = "native")]
    #[test]
    fn corrupt_file_is_a_json_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FileStore::at(&path).get(HAS_WALLET_KEY), Err(StoreError::Json(_))));
    }
}
