use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::traits::{DbInfo, NamespaceInfo, StateStore};

/// In-memory storage backend.
///
/// All data lives in a `BTreeMap` behind an `RwLock`; nothing touches disk.
/// Suitable for tests and throwaway servers.
///
/// # Example
///
/// ```
/// use pollcast_store::{MemoryStore, StateStore};
///
/// let store = MemoryStore::new();
/// store.put("polls", "p1", b"bytes").unwrap();
///
/// let data = store.get("polls", "p1").unwrap().unwrap();
/// assert_eq!(data, b"bytes");
/// ```
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

/// Error type for the in-memory backend.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    /// A thread panicked while holding the map lock.
    #[error("memory store lock poisoned")]
    LockPoisoned,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all namespaces.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<(String, String), Vec<u8>>>, MemoryError> {
        self.state.read().map_err(|_| MemoryError::LockPoisoned)
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<(String, String), Vec<u8>>>, MemoryError> {
        self.state.write().map_err(|_| MemoryError::LockPoisoned)
    }

    fn ns_key(namespace: &str, key: &str) -> (String, String) {
        (namespace.to_string(), key.to_string())
    }
}

impl StateStore for MemoryStore {
    type Error = MemoryError;

    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        self.write()?
            .insert(Self::ns_key(namespace, key), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.read()?.get(&Self::ns_key(namespace, key)).cloned())
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>, Self::Error> {
        Ok(self
            .read()?
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, k)| k.clone())
            .collect())
    }

    fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, Self::Error> {
        let mut state = self.write()?;
        let slot = Self::ns_key(namespace, key);
        if state.get(&slot).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        state.insert(slot, new.to_vec());
        Ok(true)
    }

    fn db_info(&self) -> Result<DbInfo, Self::Error> {
        let state = self.read()?;
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for (ns, _) in state.keys() {
            *counts.entry(ns.as_str()).or_default() += 1;
        }

        Ok(DbInfo {
            total_keys: state.len() as u64,
            namespaces: counts
                .into_iter()
                .map(|(name, key_count)| NamespaceInfo {
                    name: name.to_string(),
                    key_count,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_put_get() {
        let store = MemoryStore::new();
        store.put("ns", "k1", b"hello").unwrap();
        assert_eq!(store.get("ns", "k1").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get("ns", "k2").unwrap(), None);

        store.put("ns", "k1", b"world").unwrap();
        assert_eq!(store.get("ns", "k1").unwrap(), Some(b"world".to_vec()));
    }

    #[test]
    fn state_namespace_isolation() {
        let store = MemoryStore::new();
        store.put("a", "k", b"one").unwrap();
        store.put("b", "k", b"two").unwrap();
        assert_eq!(store.get("a", "k").unwrap(), Some(b"one".to_vec()));
        assert_eq!(store.get("b", "k").unwrap(), Some(b"two".to_vec()));
        assert_eq!(store.list_keys("a").unwrap(), vec!["k"]);
    }

    #[test]
    fn list_keys_sorted() {
        let store = MemoryStore::new();
        store.put("ns", "c", b"").unwrap();
        store.put("ns", "a", b"").unwrap();
        store.put("ns", "b", b"").unwrap();
        assert_eq!(store.list_keys("ns").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn cas_insert_only_when_absent() {
        let store = MemoryStore::new();
        assert!(store.compare_and_swap("ns", "k", None, b"v1").unwrap());
        assert!(!store.compare_and_swap("ns", "k", None, b"v2").unwrap());
        assert_eq!(store.get("ns", "k").unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn cas_replace_requires_match() {
        let store = MemoryStore::new();
        store.put("ns", "k", b"v1").unwrap();
        assert!(!store
            .compare_and_swap("ns", "k", Some(b"other"), b"v2")
            .unwrap());
        assert!(store.compare_and_swap("ns", "k", Some(b"v1"), b"v2").unwrap());
        assert_eq!(store.get("ns", "k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn cas_on_missing_key_with_expectation_fails() {
        let store = MemoryStore::new();
        assert!(!store.compare_and_swap("ns", "k", Some(b"v"), b"w").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn db_info_counts() {
        let store = MemoryStore::new();
        store.put("polls", "a", b"").unwrap();
        store.put("polls", "b", b"").unwrap();
        store.put("other", "x", b"").unwrap();

        let info = store.db_info().unwrap();
        assert_eq!(info.total_keys, 3);
        assert_eq!(info.namespaces.len(), 2);
        assert_eq!(info.namespaces[0].name, "other");
        assert_eq!(info.namespaces[1].key_count, 2);
    }
}
