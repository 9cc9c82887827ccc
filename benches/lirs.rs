use std::hint::black_box;
use std::sync::{Arc, Barrier};
use std::thread;

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use lirskit::policy::lirs::{ENTRY_MEMORY_OVERHEAD, LirsCache};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const ENTRY_COST: i32 = 64;
const ENTRIES: i64 = 4096;

fn cache_for(entries: i64, segments: usize) -> LirsCache<u64> {
    LirsCache::builder()
        .max_memory(entries * i64::from(ENTRY_COST + ENTRY_MEMORY_OVERHEAD))
        .segment_count(segments)
        .build()
}

fn filled(entries: i64, segments: usize) -> LirsCache<u64> {
    let cache = cache_for(entries, segments);
    for key in 0..entries {
        cache.put(key, key as u64, ENTRY_COST).unwrap();
    }
    cache
}

fn bench_put_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("lirs");
    group.throughput(Throughput::Elements(ENTRIES as u64 * 2));
    group.bench_function("put_get", |b| {
        b.iter_batched(
            || filled(ENTRIES, 16),
            |cache| {
                for i in 0..ENTRIES {
                    cache.put(black_box(i + 100_000), i as u64, ENTRY_COST).unwrap();
                    let _ = black_box(cache.get(black_box(i)));
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_get_hot(c: &mut Criterion) {
    let mut group = c.benchmark_group("lirs");
    group.throughput(Throughput::Elements(ENTRIES as u64));
    for distance in [0u32, 32] {
        group.bench_function(format!("get_hot/stack_move_distance={distance}"), |b| {
            b.iter_batched(
                || {
                    let cache = LirsCache::builder()
                        .max_memory(ENTRIES * i64::from(ENTRY_COST + ENTRY_MEMORY_OVERHEAD))
                        .stack_move_distance(distance)
                        .build();
                    for key in 0..ENTRIES {
                        cache.put(key, key as u64, ENTRY_COST).unwrap();
                    }
                    cache
                },
                |cache| {
                    for i in 0..ENTRIES {
                        let _ = black_box(cache.get(black_box(i)));
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_eviction_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("lirs");
    group.throughput(Throughput::Elements(ENTRIES as u64 * 4));
    group.bench_function("eviction_churn", |b| {
        b.iter_batched(
            || filled(ENTRIES, 1),
            |cache| {
                for i in 0..ENTRIES * 4 {
                    cache.put(black_box(1_000_000 + i), i as u64, ENTRY_COST).unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_skewed_hit_rate(c: &mut Criterion) {
    let mut group = c.benchmark_group("lirs");
    group.throughput(Throughput::Elements(50_000));
    group.bench_function("skewed_with_scans", |b| {
        b.iter_batched(
            || (filled(ENTRIES, 4), SmallRng::seed_from_u64(42)),
            |(cache, mut rng)| {
                let mut scan = 10_000_000i64;
                for step in 0..50_000u64 {
                    let key = if step % 10 == 0 {
                        scan += 1;
                        scan
                    } else {
                        // squared uniform sample skews toward low keys
                        let u: f64 = rng.random();
                        (u * u * (ENTRIES * 2) as f64) as i64
                    };
                    if cache.get(key).is_none() {
                        cache.put(key, step, ENTRY_COST).unwrap();
                    }
                }
                black_box(cache.hits())
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("lirs");
    let threads = 4;
    let per_thread = 10_000u64;
    group.throughput(Throughput::Elements(threads as u64 * per_thread));
    group.bench_function("contended_4_threads", |b| {
        b.iter_batched(
            || Arc::new(filled(ENTRIES, 16)),
            |cache| {
                let barrier = Arc::new(Barrier::new(threads));
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let cache = Arc::clone(&cache);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            let mut rng = SmallRng::seed_from_u64(t as u64);
                            barrier.wait();
                            for i in 0..per_thread {
                                let key = rng.random_range(0..ENTRIES * 2);
                                if cache.get(key).is_none() {
                                    cache.put(key, i, ENTRY_COST).unwrap();
                                }
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_put_get,
    bench_get_hot,
    bench_eviction_churn,
    bench_skewed_hit_rate,
    bench_contended
);
criterion_main!(benches);
