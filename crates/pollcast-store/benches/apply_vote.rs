use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pollcast_core::VoterId;
use pollcast_store::{MemoryStore, PollStore, SqliteStore};

fn voters(n: usize) -> Vec<VoterId> {
    (0..n)
        .map(|i| VoterId::new(format!("10.0.{}.{}", i / 256, i % 256)).unwrap())
        .collect()
}

fn bench_memory_apply_vote(c: &mut Criterion) {
    let voters = voters(1000);

    c.bench_function("MemoryStore apply_vote x1000", |b| {
        b.iter_batched(
            || {
                let store = PollStore::new(MemoryStore::new());
                let poll = store.create("Q", &["a", "b", "c"]).unwrap();
                (store, poll.id())
            },
            |(store, id)| {
                for (i, voter) in voters.iter().enumerate() {
                    store.apply_vote(id, i % 3, voter).unwrap();
                }
                black_box(store.fetch(id).unwrap().total_votes())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_sqlite_apply_vote(c: &mut Criterion) {
    let voters = voters(200);

    c.bench_function("SqliteStore apply_vote x200", |b| {
        b.iter_batched(
            || {
                let store = PollStore::new(SqliteStore::open_in_memory().unwrap());
                let poll = store.create("Q", &["a", "b"]).unwrap();
                (store, poll.id())
            },
            |(store, id)| {
                for (i, voter) in voters.iter().enumerate() {
                    store.apply_vote(id, i % 2, voter).unwrap();
                }
                black_box(store.fetch(id).unwrap().total_votes())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_duplicate_rejection(c: &mut Criterion) {
    let store = PollStore::new(MemoryStore::new());
    let poll = store.create("Q", &["a", "b"]).unwrap();
    let voter = VoterId::new("repeat").unwrap();
    store.apply_vote(poll.id(), 0, &voter).unwrap();

    c.bench_function("MemoryStore duplicate rejection", |b| {
        b.iter(|| black_box(store.apply_vote(poll.id(), 1, &voter).is_err()))
    });
}

criterion_group!(
    benches,
    bench_memory_apply_vote,
    bench_sqlite_apply_vote,
    bench_duplicate_rejection,
);
criterion_main!(benches);
