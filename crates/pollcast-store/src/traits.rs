/// Summary information about a stored namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// Name of the namespace.
    pub name: String,
    /// Number of keys stored in it.
    pub key_count: u64,
}

/// Summary information about the entire database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbInfo {
    /// Total number of keys across all namespaces.
    pub total_keys: u64,
    /// Per-namespace breakdown, sorted by name.
    pub namespaces: Vec<NamespaceInfo>,
}

/// Namespaced byte key-value storage shared across request threads.
///
/// Values are opaque bytes; the store does not interpret them. Every method
/// takes `&self` so a single backend can serve concurrent callers; each
/// backend provides its own interior synchronisation.
///
/// [`compare_and_swap`](StateStore::compare_and_swap) is the only write that
/// conditional updates rely on. It must be atomic with respect to every other
/// write on the same `(namespace, key)`, including writes from other
/// processes sharing the same database file.
pub trait StateStore: Send + Sync {
    /// Error type for this backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store a value under `(namespace, key)` unconditionally.
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), Self::Error>;

    /// Retrieve a value by `(namespace, key)`.
    /// Returns `None` if the key does not exist.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// List all keys in a namespace, sorted.
    fn list_keys(&self, namespace: &str) -> Result<Vec<String>, Self::Error>;

    /// Replace the value under `(namespace, key)` with `new` only if the
    /// current value equals `expected`.
    ///
    /// `expected == None` means "only if absent". Returns `true` when the
    /// write happened and `false` when the current value did not match.
    fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, Self::Error>;

    /// Per-namespace key counts.
    fn db_info(&self) -> Result<DbInfo, Self::Error>;
}
