//! In-memory store. Clones share one map, the way tabs of one origin share
//! their local storage.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::{StateStore, StoreError};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
    /// Optional cap on the summed length of keys and values
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once `bytes` of keys plus values are held
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota: Some(bytes),
        }
    }

    /// Seed a store from key/value pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        {
            let mut entries = store.entries.write();
            for (key, value) in pairs {
                entries.insert(key.to_string(), value.to_string());
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        if let Some(quota) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded(key.to_string()));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites_in_place() {
        let store = MemoryStore::new();
        store.set("k", "1").unwrap();
        store.set("k", "2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let tab_a = MemoryStore::new();
        let tab_b = tab_a.clone();
        tab_a.set("fislab-audio", "playing").unwrap();
        assert_eq!(tab_b.get("fislab-audio").unwrap().as_deref(), Some("playing"));
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let store = MemoryStore::with_quota(8);
        store.set("ab", "cd").unwrap();
        assert!(matches!(store.set("key", "toolong"), Err(StoreError::QuotaExceeded(_))));
        // Replacing an existing key only counts the new value
        store.set("ab", "cdefgh").unwrap();
    }
}
