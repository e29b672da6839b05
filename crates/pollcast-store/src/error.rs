use pollcast_core::{PollId, ValidationError, VoteError};
use thiserror::Error;

use crate::EnvelopeError;

/// Errors returned by [`PollStore`](crate::PollStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed creation input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No poll is stored under this id.
    #[error("poll {0} not found")]
    NotFound(PollId),

    /// The vote is out of range or a duplicate.
    #[error(transparent)]
    Vote(#[from] VoteError),

    /// The stored record could not be read or written.
    #[error("record codec error: {0}")]
    Codec(#[from] EnvelopeError),

    /// The stored record decoded but breaks the tally invariant.
    #[error("stored poll {0} is corrupt")]
    Corrupt(PollId),

    /// Another writer kept changing the record between read and write.
    #[error("poll {id} changed concurrently {attempts} times in a row")]
    Contention {
        /// Poll being updated.
        id: PollId,
        /// Number of compare-and-swap attempts made.
        attempts: u32,
    },

    /// The backend failed.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub(crate) fn backend<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        Self::Backend(Box::new(e))
    }
}
