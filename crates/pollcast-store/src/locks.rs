use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

/// A table of mutexes keyed by string, created on demand.
///
/// Callers holding different keys never block each other. An entry is
/// removed once nobody holds or waits on it, so the table only grows with
/// the number of keys under concurrent use.
#[derive(Default)]
pub(crate) struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub(crate) fn with_lock<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            // The mutex guards no data, so a panic in another holder leaves
            // nothing inconsistent behind.
            let _guard = mutex.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        drop(mutex);
        self.locks
            .remove_if(key, |_, m| Arc::strong_count(m) == 1);

        result
    }

    /// Number of keys currently tracked.
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
