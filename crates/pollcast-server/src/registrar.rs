use std::sync::Arc;
use std::time::Duration;

use pollcast_core::{Poll, PollId, PollSnapshot, ValidationError, VoteError, VoterId};
use pollcast_store::{PollStore, StateStore, StoreError};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::error::AppError;

/// Read `optionIndex` from a request body value.
///
/// Only JSON integers are accepted. Integers too large for `i64` are clamped
/// so they still fail as out of range rather than as malformed.
pub fn parse_option_index(value: Option<&Value>) -> Result<i64, ValidationError> {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .ok_or(ValidationError::MalformedOptionIndex),
        _ => Err(ValidationError::MalformedOptionIndex),
    }
}

/// Front door for poll operations: runs store calls off the async runtime
/// with a deadline and announces accepted votes.
pub struct Registrar<S: StateStore> {
    store: Arc<PollStore<S>>,
    broadcaster: Arc<Broadcaster>,
    timeout: Duration,
}

impl<S: StateStore + 'static> Registrar<S> {
    /// A registrar over `store` that announces through `broadcaster`.
    pub fn new(store: Arc<PollStore<S>>, broadcaster: Arc<Broadcaster>, timeout: Duration) -> Self {
        Self {
            store,
            broadcaster,
            timeout,
        }
    }

    /// The poll store.
    pub fn store(&self) -> &Arc<PollStore<S>> {
        &self.store
    }

    /// Validate and store a new poll.
    pub async fn create_poll(
        &self,
        question: String,
        options: Vec<String>,
    ) -> Result<Poll, AppError> {
        let poll = self
            .blocking(move |store| store.create(&question, &options))
            .await?;
        info!(poll = %poll.id(), options = poll.options().len(), "poll created");
        Ok(poll)
    }

    /// Current state of a poll.
    pub async fn fetch_poll(&self, id: PollId) -> Result<PollSnapshot, AppError> {
        let poll = self.blocking(move |store| store.fetch(id)).await?;
        Ok(poll.snapshot())
    }

    /// Number of stored polls.
    pub async fn poll_count(&self) -> Result<u64, AppError> {
        self.blocking(|store| store.count()).await
    }

    /// Register one vote and announce the new state to the poll's viewers.
    ///
    /// `option_index` is the raw `optionIndex` body value. The returned
    /// snapshot is the same one sent to viewers.
    pub async fn register_vote(
        &self,
        id: PollId,
        option_index: Option<&Value>,
        voter: VoterId,
    ) -> Result<PollSnapshot, AppError> {
        let index = parse_option_index(option_index)?;
        let Ok(index) = usize::try_from(index) else {
            // An unknown poll still reports 404 before the range check.
            self.blocking(move |store| store.fetch(id)).await?;
            return Err(VoteError::OptionOutOfRange { index }.into());
        };

        // Published from the blocking task: a vote committed after the
        // deadline still reaches viewers.
        let result = {
            let voter = voter.clone();
            let hub = Arc::clone(&self.broadcaster);
            self.blocking(move |store| {
                let snapshot = store.apply_vote(id, index, &voter)?.snapshot();
                let report = hub.publish(id, &snapshot);
                info!(
                    poll = %id,
                    option = index,
                    total = snapshot.total_votes(),
                    viewers = report.delivered,
                    "vote accepted"
                );
                debug!(poll = %id, voter = %voter, "vote recorded");
                Ok(snapshot)
            })
            .await
        };

        match result {
            Err(AppError::DuplicateVote) => {
                info!(poll = %id, "duplicate vote rejected");
                debug!(poll = %id, voter = %voter, "duplicate voter");
                Err(AppError::DuplicateVote)
            }
            Err(AppError::Timeout) => {
                warn!(poll = %id, "vote outcome unknown, store deadline passed");
                Err(AppError::Timeout)
            }
            other => other,
        }
    }

    /// Run a store call on the blocking pool under the configured deadline.
    ///
    /// A call that times out is abandoned, not cancelled: it may still
    /// commit afterwards.
    async fn blocking<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&PollStore<S>) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(&store));

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(AppError::Timeout),
            Ok(Err(join)) => Err(AppError::Internal(format!("store task failed: {join}"))),
            Ok(Ok(result)) => result.map_err(AppError::from),
        }
    }
}
