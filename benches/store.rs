use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use buslog::{Log, OpenMode};

const MESSAGES_PER_ITER: usize = 1_000;

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert", |b| {
        b.iter_batched(
            || {
                let log = Log::new();
                log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");
                log
            },
            |log| {
                for i in 0..MESSAGES_PER_ITER {
                    log.insert_message(i as i64, "/bench", "example.Int", black_box(b"payload"))
                        .expect("insert");
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_ordered_query(c: &mut Criterion) {
    c.bench_function("ordered_query", |b| {
        b.iter_batched(
            || {
                let log = Log::new();
                log.open(":memory:", OpenMode::ReadWriteCreate).expect("open");
                // Reverse insertion order so the query has to sort.
                for i in (0..MESSAGES_PER_ITER).rev() {
                    log.insert_message(i as i64, "/bench", "example.Int", b"payload")
                        .expect("insert");
                }
                log
            },
            |log| {
                let count = log.all_messages().count();
                assert_eq!(count, MESSAGES_PER_ITER);
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_insert, bench_ordered_query);
criterion_main!(benches);
