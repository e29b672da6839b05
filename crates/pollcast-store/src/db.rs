//! High-level poll storage over any [`StateStore`] backend.

use pollcast_core::{Poll, PollId, VoterId};

use crate::envelope::RecordEnvelope;
use crate::error::StoreError;
use crate::locks::KeyedLocks;
use crate::traits::{DbInfo, StateStore};

/// Namespace that poll records are stored under.
pub const POLL_NAMESPACE: &str = "polls";

/// How many times a conditional write is retried when the stored record
/// changed between read and write.
pub const MAX_CAS_ATTEMPTS: u32 = 8;

/// Poll database with an atomic vote operation.
///
/// Records are stored as postcard inside a [`RecordEnvelope`], keyed by the
/// poll id. Every mutation of one poll happens inside that poll's lock and
/// is written back with a compare-and-swap against the bytes that were read.
///
/// # Example
///
/// ```
/// use pollcast_core::VoterId;
/// use pollcast_store::{MemoryStore, PollStore, StoreError};
///
/// let store = PollStore::new(MemoryStore::new());
/// let poll = store.create("Tea or coffee?", &["Tea", "Coffee"]).unwrap();
///
/// let a = VoterId::new("A").unwrap();
/// store.apply_vote(poll.id(), 0, &a).unwrap();
///
/// let err = store.apply_vote(poll.id(), 1, &a).unwrap_err();
/// assert!(matches!(err, StoreError::Vote(_)));
///
/// let fetched = store.fetch(poll.id()).unwrap();
/// assert_eq!(fetched.options()[0].votes, 1);
/// assert_eq!(fetched.options()[1].votes, 0);
/// ```
pub struct PollStore<S: StateStore> {
    store: S,
    locks: KeyedLocks,
}

impl<S: StateStore> PollStore<S> {
    /// Wrap a backend.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Access the underlying backend.
    pub fn backend(&self) -> &S {
        &self.store
    }

    /// Validate and persist a new poll with zero tallies.
    ///
    /// Nothing is written when validation fails.
    pub fn create<T: AsRef<str>>(&self, question: &str, options: &[T]) -> Result<Poll, StoreError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let poll = Poll::new(question, options)?;
            let bytes = RecordEnvelope::encode(&poll)?;
            let key = poll.id().to_string();

            let inserted = self
                .store
                .compare_and_swap(POLL_NAMESPACE, &key, None, &bytes)
                .map_err(StoreError::backend)?;
            if inserted {
                return Ok(poll);
            }

            // Id collision; draw a fresh one.
            if attempts >= MAX_CAS_ATTEMPTS {
                return Err(StoreError::Contention {
                    id: poll.id(),
                    attempts,
                });
            }
        }
    }

    /// Load a poll by id.
    pub fn fetch(&self, id: PollId) -> Result<Poll, StoreError> {
        let (poll, _) = self.load(id)?;
        Ok(poll)
    }

    /// Record one vote and return the updated poll.
    ///
    /// Fails with [`StoreError::NotFound`] for an unknown poll and with
    /// [`StoreError::Vote`] for an out-of-range option or a voter who has
    /// already voted. The duplicate check and the increment happen under the
    /// poll's lock, so concurrent calls on one poll apply one at a time while
    /// calls on different polls proceed independently.
    pub fn apply_vote(
        &self,
        id: PollId,
        option_index: usize,
        voter: &VoterId,
    ) -> Result<Poll, StoreError> {
        let key = id.to_string();
        self.locks.with_lock(&key, || {
            for _ in 0..MAX_CAS_ATTEMPTS {
                let (mut poll, current) = self.load(id)?;
                poll.apply_vote(option_index, voter)?;

                let next = RecordEnvelope::encode(&poll)?;
                let swapped = self
                    .store
                    .compare_and_swap(POLL_NAMESPACE, &key, Some(current.as_slice()), &next)
                    .map_err(StoreError::backend)?;
                if swapped {
                    return Ok(poll);
                }
            }

            Err(StoreError::Contention {
                id,
                attempts: MAX_CAS_ATTEMPTS,
            })
        })
    }

    /// All stored poll ids, sorted by their string form.
    pub fn list_ids(&self) -> Result<Vec<PollId>, StoreError> {
        self.store
            .list_keys(POLL_NAMESPACE)
            .map_err(StoreError::backend)?
            .iter()
            .map(|key| key.parse::<PollId>().map_err(StoreError::from))
            .collect()
    }

    /// Number of stored polls.
    pub fn count(&self) -> Result<u64, StoreError> {
        let info = self.info()?;
        Ok(info
            .namespaces
            .iter()
            .find(|ns| ns.name == POLL_NAMESPACE)
            .map_or(0, |ns| ns.key_count))
    }

    /// Backend statistics.
    pub fn info(&self) -> Result<DbInfo, StoreError> {
        self.store.db_info().map_err(StoreError::backend)
    }

    fn load(&self, id: PollId) -> Result<(Poll, Vec<u8>), StoreError> {
        let bytes = self
            .store
            .get(POLL_NAMESPACE, &id.to_string())
            .map_err(StoreError::backend)?
            .ok_or(StoreError::NotFound(id))?;

        let poll: Poll = RecordEnvelope::decode(&bytes)?;
        if poll.id() != id || !poll.is_consistent() {
            return Err(StoreError::Corrupt(id));
        }
        Ok((poll, bytes))
    }
}
