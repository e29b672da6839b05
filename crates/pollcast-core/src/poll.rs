use std::collections::BTreeSet;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{PollId, PollSnapshot, ValidationError, VoteError, VoterId};

/// Minimum number of options a poll must offer.
pub const MIN_OPTIONS: usize = 2;

/// One answer of a poll together with its tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    /// Option label, never empty.
    pub text: String,
    /// Number of accepted votes for this option.
    pub votes: u64,
}

/// A poll: question, ordered options with tallies, and the voters so far.
///
/// The only mutation is [`Poll::apply_vote`], which keeps
/// `sum(options[i].votes) == voters.len()`.
///
/// # Example
///
/// ```
/// use pollcast_core::{Poll, VoterId};
///
/// let mut poll = Poll::new("Best editor?", &["vim", "emacs", "nano"]).unwrap();
/// assert_eq!(poll.total_votes(), 0);
///
/// poll.apply_vote(2, &VoterId::new("a").unwrap()).unwrap();
/// poll.apply_vote(2, &VoterId::new("b").unwrap()).unwrap();
///
/// let snapshot = poll.snapshot();
/// assert_eq!(snapshot.options[2].votes, 2);
/// assert!(poll.is_consistent());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    id: PollId,
    question: String,
    options: Vec<PollOption>,
    voters: BTreeSet<String>,
    created_at: DateTime<Utc>,
}

impl Poll {
    /// Build a new poll with a fresh id, zero tallies and no voters.
    ///
    /// The question and every option are trimmed before validation.
    pub fn new<S: AsRef<str>>(question: &str, options: &[S]) -> Result<Self, ValidationError> {
        Self::with_id(PollId::generate(), Utc::now(), question, options)
    }

    /// Build a new poll with a caller-chosen id and creation time.
    ///
    /// The timestamp is truncated to millisecond precision.
    pub fn with_id<S: AsRef<str>>(
        id: PollId,
        created_at: DateTime<Utc>,
        question: &str,
        options: &[S],
    ) -> Result<Self, ValidationError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }

        if options.len() < MIN_OPTIONS {
            return Err(ValidationError::TooFewOptions {
                found: options.len(),
            });
        }

        let options = options
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let text = text.as_ref().trim();
                if text.is_empty() {
                    Err(ValidationError::EmptyOption { index })
                } else {
                    Ok(PollOption {
                        text: text.to_string(),
                        votes: 0,
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            question: question.to_string(),
            options,
            voters: BTreeSet::new(),
            created_at: created_at.trunc_subsecs(3),
        })
    }

    /// Poll identifier.
    #[must_use]
    pub fn id(&self) -> PollId {
        self.id
    }

    /// The question text.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Options in their fixed order.
    #[must_use]
    pub fn options(&self) -> &[PollOption] {
        &self.options
    }

    /// Identities that have already voted.
    #[must_use]
    pub fn voters(&self) -> &BTreeSet<String> {
        &self.voters
    }

    /// Creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether `voter` has already voted on this poll.
    #[must_use]
    pub fn has_voted(&self, voter: &VoterId) -> bool {
        self.voters.contains(voter.as_str())
    }

    /// Sum of all option tallies.
    #[must_use]
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }

    /// Whether the tally sum matches the number of recorded voters.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.options.len() >= MIN_OPTIONS && self.total_votes() == self.voters.len() as u64
    }

    /// Apply one vote.
    ///
    /// Checks the option range first, then the duplicate guard. On error the
    /// poll is left untouched; on success exactly one tally grows by one and
    /// exactly one voter is recorded.
    pub fn apply_vote(&mut self, option_index: usize, voter: &VoterId) -> Result<(), VoteError> {
        if option_index >= self.options.len() {
            return Err(VoteError::OptionOutOfRange {
                index: i64::try_from(option_index).unwrap_or(i64::MAX),
            });
        }

        if !self.voters.insert(voter.as_str().to_string()) {
            return Err(VoteError::DuplicateVote);
        }

        self.options[option_index].votes += 1;
        Ok(())
    }

    /// The client-facing view of this poll. Voters are not included.
    #[must_use]
    pub fn snapshot(&self) -> PollSnapshot {
        PollSnapshot {
            id: self.id,
            question: self.question.clone(),
            options: self.options.clone(),
            created_at: self.created_at,
        }
    }
}
