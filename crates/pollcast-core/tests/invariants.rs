//! Property tests for the tally invariant.
//!
//! Whatever sequence of votes is attempted, the sum of all tallies must equal
//! the number of recorded voters, and rejected votes must not change state.

use pollcast_core::{Poll, VoteError, VoterId};
use proptest::prelude::*;

fn attempts() -> impl Strategy<Value = Vec<(usize, u8)>> {
    // Option indices run past the end on purpose; voters come from a small
    // pool so duplicates are common.
    prop::collection::vec((0usize..6, 0u8..12), 0..80)
}

proptest! {
    #[test]
    fn tally_sum_matches_voters(votes in attempts()) {
        let mut poll = Poll::new("Q", &["a", "b", "c", "d"]).unwrap();

        for (index, who) in votes {
            let voter = VoterId::new(format!("voter-{who}")).unwrap();
            let before = poll.clone();

            match poll.apply_vote(index, &voter) {
                Ok(()) => {
                    prop_assert_eq!(poll.total_votes(), before.total_votes() + 1);
                    prop_assert_eq!(poll.options()[index].votes, before.options()[index].votes + 1);
                }
                Err(VoteError::DuplicateVote) => {
                    prop_assert!(before.has_voted(&voter));
                    prop_assert_eq!(&poll, &before);
                }
                Err(VoteError::OptionOutOfRange { .. }) => {
                    prop_assert!(index >= 4);
                    prop_assert_eq!(&poll, &before);
                }
            }

            prop_assert!(poll.is_consistent());
        }
    }

    #[test]
    fn each_identity_counts_once(voters in prop::collection::vec(0u8..20, 1..60)) {
        let mut poll = Poll::new("Q", &["yes", "no"]).unwrap();
        for who in &voters {
            let _ = poll.apply_vote(usize::from(*who % 2), &VoterId::new(who.to_string()).unwrap());
        }

        let mut distinct = voters.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(poll.total_votes(), distinct.len() as u64);
    }
}

#[test]
fn tea_or_coffee_scenario() {
    let mut poll = Poll::new("Tea or coffee?", &["Tea", "Coffee"]).unwrap();
    let a = VoterId::new("A").unwrap();
    let b = VoterId::new("B").unwrap();

    poll.apply_vote(0, &a).unwrap();
    assert_eq!(tallies(&poll), vec![1, 0]);

    assert_eq!(poll.apply_vote(1, &a), Err(VoteError::DuplicateVote));
    assert_eq!(tallies(&poll), vec![1, 0]);

    poll.apply_vote(1, &b).unwrap();
    assert_eq!(tallies(&poll), vec![1, 1]);
}

fn tallies(poll: &Poll) -> Vec<u64> {
    poll.options().iter().map(|o| o.votes).collect()
}
