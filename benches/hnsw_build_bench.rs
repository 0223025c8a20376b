//! Benchmarks for partition construction (§4.7).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kuzu_vector_index::config::IndexConfig;
use kuzu_vector_index::hnsw::build_partition;
use kuzu_vector_index::hooks::InMemoryHooks;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

fn random_vectors(n: usize, dim: usize, seed: u64) -> (Vec<u64>, Vec<f32>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let ids = (0..n as u64).collect();
    let vectors = (0..n * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    (ids, vectors)
}

fn bench_build_partition(c: &mut Criterion) {
    let dim = 128;
    let mut group = c.benchmark_group("build_partition");
    for n in [256usize, 1024, 4096] {
        let (ids, vectors) = random_vectors(n, dim, 42);
        let mut config = IndexConfig::new(dim as i32);
        config.sq_enabled = false;

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bencher, _| {
            bencher.iter(|| {
                let mut codes = InMemoryHooks::default();
                let mut partition_buffer = InMemoryHooks::default();
                black_box(
                    build_partition(&config, &ids, &vectors, 7, &mut codes, &mut partition_buffer)
                        .unwrap(),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build_partition);
criterion_main!(benches);
