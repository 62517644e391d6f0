use web_sys::Storage;

use crate::error::StoreError;
use crate::session::SessionStore;

/// `window.localStorage`. Private browsing may make it unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorageStore;

fn storage() -> Result<Storage, StoreError> {
    let window = web_sys::window().ok_or_else(|| StoreError::Unavailable("no window".into()))?;
    window
        .local_storage()
        .map_err(|e| StoreError::Unavailable(format!("{:?}", e)))?
        .ok_or_else(|| StoreError::Unavailable("localStorage disabled".into()))
}

impl SessionStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        storage()?.get_item(key).map_err(|e| StoreError::Unavailable(format!("{:?}", e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        storage()?.set_item(key, value).map_err(|e| StoreError::Unavailable(format!("{:?}", e)))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        storage()?.remove_item(key).map_err(|e| StoreError::Unavailable(format!("{:?}", e)))
    }
}
