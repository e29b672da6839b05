//! # pollcast-core
//!
//! Poll records and the single state transition that mutates them.
//!
//! A [`Poll`] is a question with an ordered list of options, each carrying a
//! vote tally, plus the set of voter identities that have already voted.
//! Every accepted vote increments exactly one option and records exactly one
//! voter, so the sum of all tallies always equals the number of voters.
//!
//! This crate is storage- and transport-agnostic: it only knows how to build
//! a valid poll and how to apply one vote to it. Making that transition
//! atomic under concurrent access is the job of `pollcast-store`.
//!
//! ## Quick Start
//!
//! ```
//! use pollcast_core::{Poll, VoterId, VoteError};
//!
//! let mut poll = Poll::new("Tea or coffee?", &["Tea", "Coffee"]).unwrap();
//!
//! let alice = VoterId::new("10.0.0.1").unwrap();
//! poll.apply_vote(0, &alice).unwrap();
//! assert_eq!(poll.options()[0].votes, 1);
//!
//! // The same identity cannot vote twice.
//! assert_eq!(poll.apply_vote(1, &alice), Err(VoteError::DuplicateVote));
//! assert_eq!(poll.total_votes(), 1);
//! ```

#![warn(missing_docs)]

mod error;
mod id;
mod poll;
mod snapshot;
mod version;

pub use error::{ValidationError, VoteError};
pub use id::{PollId, VoterId};
pub use poll::{Poll, PollOption, MIN_OPTIONS};
pub use snapshot::PollSnapshot;
pub use version::{RecordKind, Versioned};
