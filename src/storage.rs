//! String key/value persistence: browser localStorage on the web, a map in tests.

use std::collections::HashMap;

/// Minimal storage surface shared by the boost flag, config and the
/// simulated database save.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    /// Returns false when the backing store refused the write.
    fn set(&mut self, key: &str, value: &str) -> bool;
    fn remove(&mut self, key: &str);
}

/// In-memory store. Used natively and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> bool {
        self.entries.insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// `window.localStorage`. Every call re-acquires the handle so a storage
/// that becomes unavailable mid-session degrades to no-ops.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserStorage;

#[cfg(target_arch = "wasm32")]
impl BrowserStorage {
    fn handle() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok()?
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        Self::handle()?.get_item(key).ok()?
    }

    fn set(&mut self, key: &str, value: &str) -> bool {
        match Self::handle() {
            Some(storage) => match storage.set_item(key, value) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("localStorage write failed for {key}: {e:?}");
                    false
                }
            },
            None => false,
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(storage) = Self::handle() {
            let _ = storage.remove_item(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_set_get_remove() {
        let mut s = MemoryStorage::new();
        assert_eq!(s.get("k"), None);
        assert!(s.set("k", "v"));
        assert_eq!(s.get("k").as_deref(), Some("v"));
        s.set("k", "w");
        assert_eq!(s.get("k").as_deref(), Some("w"));
        s.remove("k");
        assert_eq!(s.get("k"), None);
    }
}
