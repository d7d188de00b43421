use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use sspr_core::Position;
use sspr_storage::{InMemoryStore, PositionedDeque};

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Naive baseline: a queue kept as a dense `0..n` key range, so every pop from
/// the front renumbers the remaining keys.
#[derive(Debug, Default)]
struct ShiftingQueue {
    inner: RwLock<BTreeMap<u64, String>>,
}

impl ShiftingQueue {
    fn push_back(&self, value: String) {
        let mut map = self.inner.write().unwrap();
        let next = map.len() as u64;
        map.insert(next, value);
    }

    fn pop_front(&self) -> Option<String> {
        let mut map = self.inner.write().unwrap();
        let first = map.remove(&0)?;
        let rest: Vec<String> = std::mem::take(&mut *map).into_values().collect();
        for (i, v) in rest.into_iter().enumerate() {
            map.insert(i as u64, v);
        }
        Some(first)
    }
}

fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_then_drain");

    for &n in &[100usize, 1_000] {
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("positioned_deque", n), &n, |b, &n| {
            b.iter(|| {
                let store = Arc::new(InMemoryStore::new());
                let mut deque = PositionedDeque::open(store, "bench").unwrap();
                for i in 0..n {
                    deque.add_last(&format!("item-{i}")).unwrap();
                }
                while !deque.is_empty() {
                    black_box(deque.remove_first().unwrap());
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("shifting_keys", n), &n, |b, &n| {
            b.iter(|| {
                let queue = ShiftingQueue::default();
                for i in 0..n {
                    queue.push_back(format!("item-{i}"));
                }
                while let Some(v) = queue.pop_front() {
                    black_box(v);
                }
            })
        });
    }

    group.finish();
}

fn bench_reopen(c: &mut Criterion) {
    let store = Arc::new(InMemoryStore::new());
    {
        let mut deque = PositionedDeque::open(store.clone(), "reopen").unwrap();
        for i in 0..1_000 {
            deque.add_last(&format!("item-{i}")).unwrap();
        }
    }

    c.bench_function("reopen_clean", |b| {
        b.iter(|| black_box(PositionedDeque::open(store.clone(), "reopen").unwrap().size()))
    });

    c.bench_function("position_arithmetic", |b| {
        b.iter(|| {
            let mut p = Position::MAX.retreat(500);
            for _ in 0..1_000 {
                p = black_box(p.next());
            }
            p.distance_to(Position::ZERO)
        })
    });
}

criterion_group!(benches, bench_push_pop, bench_reopen);
criterion_main!(benches);
