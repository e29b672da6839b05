//! The same poll workflow against every backend, including reopening
//! file-backed databases.

use std::sync::Arc;
use std::thread;

use pollcast_core::{VoteError, VoterId};
use pollcast_store::{MemoryStore, PollStore, SqliteStore, StateStore, StoreError};

fn voter(s: &str) -> VoterId {
    VoterId::new(s).unwrap()
}

fn tea_or_coffee<S: StateStore>(store: &PollStore<S>) {
    let poll = store.create("Tea or coffee?", &["Tea", "Coffee"]).unwrap();
    let id = poll.id();

    let after_a = store.apply_vote(id, 0, &voter("A")).unwrap();
    let tallies: Vec<u64> = after_a.options().iter().map(|o| o.votes).collect();
    assert_eq!(tallies, vec![1, 0]);

    let err = store.apply_vote(id, 0, &voter("A")).unwrap_err();
    assert!(matches!(err, StoreError::Vote(VoteError::DuplicateVote)));
    let unchanged = store.fetch(id).unwrap();
    assert_eq!(unchanged, after_a);

    let after_b = store.apply_vote(id, 1, &voter("B")).unwrap();
    let tallies: Vec<u64> = after_b.options().iter().map(|o| o.votes).collect();
    assert_eq!(tallies, vec![1, 1]);
    assert!(after_b.is_consistent());
}

#[test]
fn memory_scenario() {
    tea_or_coffee(&PollStore::new(MemoryStore::new()));
}

#[test]
fn sqlite_scenario() {
    tea_or_coffee(&PollStore::new(SqliteStore::open_in_memory().unwrap()));
}

#[cfg(feature = "redb")]
#[test]
fn redb_scenario() {
    use pollcast_store::RedbStore;
    tea_or_coffee(&PollStore::new(RedbStore::open_in_memory().unwrap()));
}

#[test]
fn sqlite_votes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("polls.db");

    let id = {
        let store = PollStore::new(SqliteStore::open(&path).unwrap());
        let poll = store.create("Lunch?", &["Pizza", "Salad", "Soup"]).unwrap();
        store.apply_vote(poll.id(), 2, &voter("x")).unwrap();
        poll.id()
    };

    let store = PollStore::new(SqliteStore::open(&path).unwrap());
    let poll = store.fetch(id).unwrap();
    assert_eq!(poll.options()[2].votes, 1);
    assert!(poll.voters().contains("x"));

    // The voter set is durable too.
    let err = store.apply_vote(id, 0, &voter("x")).unwrap_err();
    assert!(matches!(err, StoreError::Vote(VoteError::DuplicateVote)));
    assert_eq!(store.list_ids().unwrap(), vec![id]);
}

#[test]
fn two_processes_on_one_sqlite_file() {
    // Two independent stores share nothing in memory; only the file's
    // conditional writes keep their votes apart.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let first = Arc::new(PollStore::new(SqliteStore::open(&path).unwrap()));
    let second = Arc::new(PollStore::new(SqliteStore::open(&path).unwrap()));
    let id = first.create("Q", &["a", "b"]).unwrap().id();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let store = if i % 2 == 0 {
                Arc::clone(&first)
            } else {
                Arc::clone(&second)
            };
            thread::spawn(move || store.apply_vote(id, i % 2, &voter(&format!("v{i}"))))
        })
        .collect();

    let mut accepted = 0;
    for h in handles {
        match h.join().unwrap() {
            Ok(_) => accepted += 1,
            Err(StoreError::Contention { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let poll = first.fetch(id).unwrap();
    assert_eq!(poll.total_votes(), accepted);
    assert!(poll.is_consistent());
}

#[test]
fn status_counts() {
    let store = PollStore::new(SqliteStore::open_in_memory().unwrap());
    assert_eq!(store.count().unwrap(), 0);
    store.create("Q1", &["a", "b"]).unwrap();
    store.create("Q2", &["a", "b"]).unwrap();
    assert_eq!(store.count().unwrap(), 2);

    let info = store.info().unwrap();
    assert_eq!(info.total_keys, 2);
    assert_eq!(info.namespaces[0].name, "polls");
}
