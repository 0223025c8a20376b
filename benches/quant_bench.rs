//! Benchmarks for SQ8 training, encode, and the asymmetric distance
//! computer (§4.2).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kuzu_vector_index::quantization::BatchTrainer;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

fn bench_train_and_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("sq8_train_and_encode");
    for dim in [128usize, 768] {
        let vectors = random_vectors(2048, dim, 42);
        let refs: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();

        group.throughput(Throughput::Elements(refs.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |bencher, &dim| {
            bencher.iter(|| {
                let mut trainer = BatchTrainer::new(dim).unwrap();
                trainer.observe(&refs);
                let quantizer = trainer.finalize();
                let mut code = vec![0u8; quantizer.code_size()];
                for v in &refs {
                    quantizer.encode(v, &mut code);
                    black_box(&code);
                }
            });
        });
    }
    group.finish();
}

fn bench_asym_l2sq(c: &mut Criterion) {
    let dim = 384;
    let vectors = random_vectors(1024, dim, 7);
    let refs: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();
    let mut trainer = BatchTrainer::new(dim).unwrap();
    trainer.observe(&refs);
    let quantizer = trainer.finalize();
    let mut code = vec![0u8; quantizer.code_size()];
    quantizer.encode(&vectors[0], &mut code);

    let mut group = c.benchmark_group("sq8_asym_l2sq");
    group.throughput(Throughput::Elements(dim as u64));
    group.bench_function("single", |bencher| {
        bencher.iter(|| black_box(quantizer.asym_l2sq(&vectors[1], &code)));
    });
    group.finish();
}

criterion_group!(benches, bench_train_and_encode, bench_asym_l2sq);
criterion_main!(benches);
