//! Benchmarks for uniform grid evaluation.
//!
//! Measures:
//!   1. Primitive generator throughput at several grid sizes
//!   2. Graph complexity scaling (bare noise → fractal → domain-warped cells)
//!   3. Batch width: the same graph forced to different SIMD tiers
//!
//! Run with:
//!   cargo bench --bench eval_bench
//!
//! Results are written to `target/criterion/` with HTML reports.

use criterion::{
    black_box, criterion_group, criterion_main, measurement::WallTime, BenchmarkGroup, BenchmarkId,
    Criterion, Throughput,
};
use noisegraph::{
    CellularDistance, CellularReturnType, Dim, DomainOffset, EvalConfig, FractalFBm, Generator,
    GeneratorCache, OpenSimplex2, Perlin, SimdTier, Simplex, Value,
};

// ── Graph factories ────────────────────────────────────────────────

fn fbm(octaves: i32) -> Generator {
    let fbm = FractalFBm::new();
    fbm.set_source(&Simplex::new()).unwrap();
    fbm.set_octave_count(octaves).unwrap();
    fbm.generator()
}

/// Cellular distance warped by a cached FBm on both axes.
fn warped_cells() -> Generator {
    let warp = GeneratorCache::new();
    warp.set_source(&fbm(3)).unwrap();
    let cells = CellularDistance::new();
    cells.set_return_type(CellularReturnType::Index0Sub1);
    let offset = DomainOffset::new();
    offset.set_source(&cells).unwrap();
    offset.set_offset(Dim::X, &warp).unwrap();
    offset.set_offset(Dim::Y, &warp).unwrap();
    offset.generator()
}

fn bench_grid(
    group: &mut BenchmarkGroup<'_, WallTime>,
    id: BenchmarkId,
    gen: &Generator,
    size: i32,
    config: &EvalConfig,
) {
    let mut buffer = vec![0.0f32; (size * size) as usize];
    group.bench_with_input(id, &size, |b, &size| {
        b.iter(|| {
            gen.gen_uniform_grid_2d_with(
                black_box(&mut buffer),
                0,
                0,
                size,
                size,
                0.02,
                1337,
                config,
            )
            .unwrap()
        })
    });
}

// ── Benchmarks ─────────────────────────────────────────────────────

fn primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");
    let config = EvalConfig::default();
    let gens: [(&str, Generator); 4] = [
        ("simplex", Simplex::new().generator()),
        ("open_simplex2", OpenSimplex2::new().generator()),
        ("perlin", Perlin::new().generator()),
        ("value", Value::new().generator()),
    ];
    for size in [64, 256] {
        group.throughput(Throughput::Elements((size * size) as u64));
        for (name, gen) in &gens {
            bench_grid(&mut group, BenchmarkId::new(*name, size), gen, size, &config);
        }
    }
    group.finish();
}

fn complexity(c: &mut Criterion) {
    let mut group = c.benchmark_group("complexity");
    let config = EvalConfig::default();
    let size = 128;
    group.throughput(Throughput::Elements((size * size) as u64));
    for octaves in [1, 3, 6] {
        bench_grid(
            &mut group,
            BenchmarkId::new("fbm_octaves", octaves),
            &fbm(octaves),
            size,
            &config,
        );
    }
    bench_grid(
        &mut group,
        BenchmarkId::new("warped_cells", size),
        &warped_cells(),
        size,
        &config,
    );
    group.finish();
}

fn tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiers");
    let gen = fbm(4);
    let size = 256;
    group.throughput(Throughput::Elements((size * size) as u64));
    for tier in [SimdTier::Scalar, SimdTier::Sse41, SimdTier::Avx2, SimdTier::Avx512] {
        let config = EvalConfig::with_tier(tier);
        bench_grid(&mut group, BenchmarkId::new("fbm4", tier), &gen, size, &config);
    }
    group.finish();
}

criterion_group!(benches, primitives, complexity, tiers);
criterion_main!(benches);
