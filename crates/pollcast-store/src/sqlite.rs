//! SQLite persistence backend using rusqlite.
//!
//! The default backend for single-node deployments. Uses WAL mode by default
//! so status readers don't block vote writers.
//!
//! # Example
//!
//! ```no_run
//! use pollcast_store::{SqliteStore, StateStore};
//!
//! let store = SqliteStore::open("pollcast.db").unwrap();
//! store.put("polls", "p1", b"bytes").unwrap();
//!
//! let data = store.get("polls", "p1").unwrap().unwrap();
//! assert_eq!(data, b"bytes");
//! ```

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::config::SqliteConfig;
use crate::traits::{DbInfo, NamespaceInfo, StateStore};

/// Error type for the SQLite backend.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// An error from rusqlite.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A thread panicked while holding the connection.
    #[error("sqlite lock poisoned")]
    LockPoisoned,
}

/// SQLite persistence backend.
///
/// Wraps a `rusqlite::Connection` behind a `Mutex` for shared access and
/// creates the schema on first open. Conditional writes are single SQL
/// statements, so they stay atomic even when another process has the same
/// file open.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path with default config.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqliteError> {
        Self::open_with_config(path, SqliteConfig::default())
    }

    /// Open with custom configuration.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteConfig,
    ) -> Result<Self, SqliteError> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn, &config)?;
        Self::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, SqliteError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn, &SqliteConfig::default())?;
        Self::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_connection(conn: &Connection, config: &SqliteConfig) -> Result<(), SqliteError> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {};
             PRAGMA busy_timeout = {};
             PRAGMA synchronous = NORMAL;",
            config.journal_mode.as_str(),
            config.busy_timeout_ms,
        ))?;
        Ok(())
    }

    fn create_schema(conn: &Connection) -> Result<(), SqliteError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pollcast_state (
                namespace   TEXT NOT NULL,
                key         TEXT NOT NULL,
                data        BLOB NOT NULL,
                updated_at  INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (namespace, key)
            );",
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteError> {
        self.conn.lock().map_err(|_| SqliteError::LockPoisoned)
    }

    fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Get the database file size in bytes.
    pub fn file_size(&self) -> Result<u64, SqliteError> {
        let conn = self.lock()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((page_count * page_size) as u64)
    }

    /// Get the current journal mode.
    pub fn journal_mode(&self) -> Result<String, SqliteError> {
        let conn = self.lock()?;
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode)
    }
}

impl StateStore for SqliteStore {
    type Error = SqliteError;

    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO pollcast_state (namespace, key, data, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, key)
             DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![namespace, key, value, Self::now_ms() as i64],
        )?;
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                "SELECT data FROM pollcast_state WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT key FROM pollcast_state WHERE namespace = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![namespace], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, Self::Error> {
        let conn = self.lock()?;
        let now = Self::now_ms() as i64;
        let changed = match expected {
            None => conn.execute(
                "INSERT INTO pollcast_state (namespace, key, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, key) DO NOTHING",
                params![namespace, key, new, now],
            )?,
            Some(old) => conn.execute(
                "UPDATE pollcast_state SET data = ?3, updated_at = ?4
                 WHERE namespace = ?1 AND key = ?2 AND data = ?5",
                params![namespace, key, new, now, old],
            )?,
        };
        Ok(changed == 1)
    }

    fn db_info(&self) -> Result<DbInfo, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT namespace, COUNT(*) FROM pollcast_state
             GROUP BY namespace ORDER BY namespace",
        )?;
        let namespaces = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok(NamespaceInfo {
                    name: row.get(0)?,
                    key_count: count as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DbInfo {
            total_keys: namespaces.iter().map(|ns| ns.key_count).sum(),
            namespaces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JournalMode;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn state_put_get() {
        let store = test_store();
        store.put("ns", "k1", b"hello").unwrap();
        assert_eq!(store.get("ns", "k1").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get("ns", "missing").unwrap(), None);

        store.put("ns", "k1", b"world").unwrap();
        assert_eq!(store.get("ns", "k1").unwrap(), Some(b"world".to_vec()));
    }

    #[test]
    fn state_namespace_isolation() {
        let store = test_store();
        store.put("a", "k", b"one").unwrap();
        store.put("b", "k", b"two").unwrap();
        assert_eq!(store.get("a", "k").unwrap(), Some(b"one".to_vec()));
        assert_eq!(store.get("b", "k").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn state_list_keys() {
        let store = test_store();
        store.put("ns", "b", b"").unwrap();
        store.put("ns", "a", b"").unwrap();
        store.put("other", "z", b"").unwrap();
        assert_eq!(store.list_keys("ns").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn cas_insert_and_replace() {
        let store = test_store();
        assert!(store.compare_and_swap("ns", "k", None, b"v1").unwrap());
        assert!(!store.compare_and_swap("ns", "k", None, b"v2").unwrap());
        assert!(!store.compare_and_swap("ns", "k", Some(b"v0"), b"v2").unwrap());
        assert!(store.compare_and_swap("ns", "k", Some(b"v1"), b"v2").unwrap());
        assert_eq!(store.get("ns", "k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn db_info_counts() {
        let store = test_store();
        store.put("polls", "a", b"").unwrap();
        store.put("polls", "b", b"").unwrap();
        store.put("meta", "x", b"").unwrap();

        let info = store.db_info().unwrap();
        assert_eq!(info.total_keys, 3);
        assert_eq!(info.namespaces[0].name, "meta");
        assert_eq!(info.namespaces[1].key_count, 2);
    }

    #[test]
    fn open_file_based() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("ns", "k", b"value").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("ns", "k").unwrap(), Some(b"value".to_vec()));
        assert!(store.file_size().unwrap() > 0);
    }

    #[test]
    fn two_handles_share_conditional_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let first = SqliteStore::open(&path).unwrap();
        let second = SqliteStore::open(&path).unwrap();

        assert!(first.compare_and_swap("ns", "k", None, b"v1").unwrap());
        assert!(!second.compare_and_swap("ns", "k", None, b"v1").unwrap());
        assert!(second.compare_and_swap("ns", "k", Some(b"v1"), b"v2").unwrap());
        assert!(!first.compare_and_swap("ns", "k", Some(b"v1"), b"v3").unwrap());
    }

    #[test]
    fn wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.journal_mode().unwrap().to_lowercase(), "wal");
    }

    #[test]
    fn open_with_config_applies_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollback.db");
        let config = SqliteConfig {
            journal_mode: JournalMode::Delete,
            busy_timeout_ms: 250,
        };
        let store = SqliteStore::open_with_config(&path, config).unwrap();
        assert_eq!(store.journal_mode().unwrap().to_lowercase(), "delete");

        let busy: i64 = store
            .lock()
            .unwrap()
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(busy, 250);
    }
}
