//! Benchmarks for the lock-free deque and the bounded ordered set,
//! with a mutexed VecDeque as the contended baseline.
//!
//! Run with: cargo bench --package strand-crossbeam --bench deque_benchmark

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;

use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use mimalloc::MiMalloc;

use strand_core::{BoundedOrderedSet, ConcurrentDeque};
use strand_crossbeam::{EpochGuard, SkipListSet};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const OPS_PER_THREAD: usize = 10_000;

type EpochDeque = ConcurrentDeque<u64, EpochGuard>;
type SkipBounded = BoundedOrderedSet<u64, SkipListSet<u64>>;

fn bench_deque_sequential(c: &mut Criterion) {
    c.bench_function("deque/sequential_add_poll", |b| {
        b.iter(|| {
            let deque = EpochDeque::new();
            for i in 0..1_000u64 {
                deque.add_last(black_box(i));
            }
            for _ in 0..1_000 {
                black_box(deque.poll_first());
            }
        });
    });
}

fn run_producer_consumer(deque: Arc<EpochDeque>, producers: usize, consumers: usize) {
    let mut handles = Vec::new();

    for p in 0..producers {
        let deque = Arc::clone(&deque);
        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                deque.add_last((p * OPS_PER_THREAD + i) as u64);
            }
        }));
    }
    for _ in 0..consumers {
        let deque = Arc::clone(&deque);
        handles.push(thread::spawn(move || {
            let mut taken = 0;
            while taken < OPS_PER_THREAD {
                if deque.poll_first().is_some() {
                    taken += 1;
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

fn run_mutex_producer_consumer(
    deque: Arc<Mutex<VecDeque<u64>>>,
    producers: usize,
    consumers: usize,
) {
    let mut handles = Vec::new();

    for p in 0..producers {
        let deque = Arc::clone(&deque);
        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                deque.lock().unwrap().push_back((p * OPS_PER_THREAD + i) as u64);
            }
        }));
    }
    for _ in 0..consumers {
        let deque = Arc::clone(&deque);
        handles.push(thread::spawn(move || {
            let mut taken = 0;
            while taken < OPS_PER_THREAD {
                if deque.lock().unwrap().pop_front().is_some() {
                    taken += 1;
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_deque_producer_consumer(c: &mut Criterion) {
    let mut group = c.benchmark_group("deque/producer_consumer");
    group.sample_size(10);

    for threads in [2usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("lock_free", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    run_producer_consumer(Arc::new(EpochDeque::new()), threads, threads);
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("mutex_vecdeque", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    run_mutex_producer_consumer(
                        Arc::new(Mutex::new(VecDeque::new())),
                        threads,
                        threads,
                    );
                });
            },
        );
    }

    group.finish();
}

fn bench_bounded_set_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_set/insert");
    group.sample_size(10);

    for threads in [1usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("skiplist", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let set: Arc<SkipBounded> = Arc::new(BoundedOrderedSet::new(1_000));
                    let handles: Vec<_> = (0..threads)
                        .map(|t: usize| {
                            let set = Arc::clone(&set);
                            thread::spawn(move || {
                                for i in 0..OPS_PER_THREAD {
                                    set.insert((t * OPS_PER_THREAD + i) as u64);
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    black_box(set.len());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_deque_sequential,
    bench_deque_producer_consumer,
    bench_bounded_set_insert
);
criterion_main!(benches);
