//! Pure-Rust key-value backend using [`redb`](https://docs.rs/redb).
//!
//! No C dependencies. Enable with `features = ["redb"]`.
//!
//! ```no_run
//! use pollcast_store::{RedbStore, StateStore};
//!
//! let store = RedbStore::open("/tmp/pollcast.redb").unwrap();
//! store.put("polls", "p1", b"bytes").unwrap();
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use thiserror::Error;

use crate::traits::{DbInfo, NamespaceInfo, StateStore};

const STATE_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("pollcast_state");

/// Errors returned by [`RedbStore`] operations.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RedbError(String);

fn err(e: impl std::fmt::Display) -> RedbError {
    RedbError(e.to_string())
}

/// A pure-Rust persistence backend built on [`redb`].
///
/// Every operation runs in its own redb transaction. redb serialises write
/// transactions, so a compare-and-swap is a read and a write inside one.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RedbError> {
        let db = Database::create(path).map_err(err)?;
        Self::init(db)
    }

    /// Create an in-memory redb database.
    pub fn open_in_memory() -> Result<Self, RedbError> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(err)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, RedbError> {
        let txn = db.begin_write().map_err(err)?;
        txn.open_table(STATE_TABLE).map_err(err)?;
        txn.commit().map_err(err)?;
        Ok(Self { db })
    }
}

impl StateStore for RedbStore {
    type Error = RedbError;

    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), RedbError> {
        let txn = self.db.begin_write().map_err(err)?;
        {
            let mut table = txn.open_table(STATE_TABLE).map_err(err)?;
            table
                .insert(state_key(namespace, key).as_slice(), value)
                .map_err(err)?;
        }
        txn.commit().map_err(err)?;
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(STATE_TABLE).map_err(err)?;
        let value = table
            .get(state_key(namespace, key).as_slice())
            .map_err(err)?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(STATE_TABLE).map_err(err)?;

        let lower = state_key_prefix(namespace, 0);
        let upper = state_key_prefix(namespace, 1);
        let range = table
            .range(lower.as_slice()..upper.as_slice())
            .map_err(err)?;

        let mut keys = Vec::new();
        for item in range {
            let (key_guard, _) = item.map_err(err)?;
            if let Some((_, k)) = parse_state_key(key_guard.value()) {
                keys.push(k.to_string());
            }
        }
        Ok(keys)
    }

    fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, RedbError> {
        let slot = state_key(namespace, key);
        let txn = self.db.begin_write().map_err(err)?;
        let swapped = {
            let mut table = txn.open_table(STATE_TABLE).map_err(err)?;
            let current = table
                .get(slot.as_slice())
                .map_err(err)?
                .map(|guard| guard.value().to_vec());

            if current.as_deref() == expected {
                table.insert(slot.as_slice(), new).map_err(err)?;
                true
            } else {
                false
            }
        };

        if swapped {
            txn.commit().map_err(err)?;
        } else {
            txn.abort().map_err(err)?;
        }
        Ok(swapped)
    }

    fn db_info(&self) -> Result<DbInfo, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(STATE_TABLE).map_err(err)?;

        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for item in table.iter().map_err(err)? {
            let (key_guard, _) = item.map_err(err)?;
            if let Some((ns, _)) = parse_state_key(key_guard.value()) {
                *counts.entry(ns.to_string()).or_default() += 1;
            }
        }

        Ok(DbInfo {
            total_keys: counts.values().sum(),
            namespaces: counts
                .into_iter()
                .map(|(name, key_count)| NamespaceInfo { name, key_count })
                .collect(),
        })
    }
}

/// State key: `namespace \0 key`
fn state_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut k = Vec::with_capacity(namespace.len() + 1 + key.len());
    k.extend_from_slice(namespace.as_bytes());
    k.push(0);
    k.extend_from_slice(key.as_bytes());
    k
}

/// Namespace followed by a single separator byte. With `0` this is the
/// inclusive lower bound of the namespace's keys, with `1` the exclusive
/// upper bound.
fn state_key_prefix(namespace: &str, sep: u8) -> Vec<u8> {
    let mut k = Vec::with_capacity(namespace.len() + 1);
    k.extend_from_slice(namespace.as_bytes());
    k.push(sep);
    k
}

fn parse_state_key(key: &[u8]) -> Option<(&str, &str)> {
    let pos = key.iter().position(|&b| b == 0)?;
    let ns = std::str::from_utf8(&key[..pos]).ok()?;
    let k = std::str::from_utf8(&key[pos + 1..]).ok()?;
    Some((ns, k))
}
