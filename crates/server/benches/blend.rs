//! Benchmarks for hybrid blending
//!
//! Run with: cargo bench --package server

use catalog::Game;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use server::{BlendConfig, BlendPlan, blend_pools};

fn pool(start: u32, len: u32) -> Vec<Game> {
    (start..start + len)
        .map(|id| Game::new(id, format!("Game {id}")))
        .collect()
}

fn bench_blend_pools(c: &mut Criterion) {
    let config = BlendConfig::default();
    let mut group = c.benchmark_group("blend_pools");

    for count in [5, 10, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| {
                let plan = BlendPlan::new(count, &config, &mut rng);
                // Overlapping pools exercise deduplication and the remainder fill
                let clustering = pool(1, plan.clustering_pool as u32);
                let similarity = pool(5, plan.similarity_pool as u32);
                black_box(blend_pools(
                    black_box(0),
                    count,
                    &plan,
                    clustering,
                    similarity,
                    &mut rng,
                ))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_blend_pools);
criterion_main!(benches);
