/// Preprocessing benchmarks for hicnorm
///
/// Run with: cargo bench --bench preprocess
/// For larger collections: BENCH_TIER=large cargo bench --bench preprocess
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hicnorm::{
    downsample_to_count, reformat, BulkAggregator, DownsampleConfig, Epsilons, NormalizerSpec,
    PerCellNormalizer, SparseContactMatrix, StratifiedDownsampler, WindowConfig, WindowLayout,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;
use std::time::Duration;

/// Benchmark tier controlled by environment variable
fn get_bench_tier() -> String {
    std::env::var("BENCH_TIER").unwrap_or_else(|_| "quick".to_string())
}

/// Generate a collection of contact matrices with distance-decaying counts
fn generate_cells(
    count: usize,
    n_bins: usize,
    contacts_per_bin: usize,
    seed: u64,
) -> Vec<SparseContactMatrix> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut row = Vec::with_capacity(n_bins * contacts_per_bin);
            let mut col = Vec::with_capacity(n_bins * contacts_per_bin);
            let mut data = Vec::with_capacity(n_bins * contacts_per_bin);
            for i in 0..n_bins {
                for _ in 0..contacts_per_bin {
                    // geometric-ish decay away from the diagonal
                    let distance = (rng.gen::<f64>().powi(3) * (n_bins - i) as f64) as usize;
                    row.push(i);
                    col.push((i + distance).min(n_bins - 1));
                    data.push(rng.gen_range(1..10) as f64);
                }
            }
            SparseContactMatrix::from_upper_triangle(n_bins, row, col, data)
                .expect("generated entries are valid")
        })
        .collect()
}

fn sizes() -> Vec<(usize, usize)> {
    match get_bench_tier().as_str() {
        "large" => vec![(200, 500), (1000, 500), (1000, 2000)],
        _ => vec![(100, 200), (400, 200)],
    }
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(10);

    for (count, n_bins) in sizes() {
        let cells = generate_cells(count, n_bins, 8, 42);
        let aggregator = BulkAggregator::default();
        group.bench_with_input(
            BenchmarkId::new("bulk", format!("{}x{}", count, n_bins)),
            &cells,
            |b, cells| b.iter(|| aggregator.aggregate(black_box(cells))),
        );
    }
    group.finish();
}

fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(10);

    let eps = Epsilons::default();
    for (count, n_bins) in sizes() {
        let cells = generate_cells(count, n_bins, 8, 7);
        let pipeline = PerCellNormalizer::new(
            vec![
                NormalizerSpec::SquareRootCoverage.build(&eps),
                NormalizerSpec::ObservedExpected.build(&eps),
            ],
            Vec::new(),
        );
        group.bench_with_input(
            BenchmarkId::new("sqvc_oe", format!("{}x{}", count, n_bins)),
            &cells,
            |b, cells| {
                b.iter(|| {
                    let mut work = cells.clone();
                    pipeline.run(black_box(&mut work), None, None)
                })
            },
        );
    }
    group.finish();
}

fn bench_thinning(c: &mut Criterion) {
    let mut group = c.benchmark_group("thinning");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(10);

    for (count, n_bins) in sizes() {
        let cells = generate_cells(count, n_bins, 8, 3);
        let half = count / 2;
        let sampler = StratifiedDownsampler::new(&DownsampleConfig::default());
        let label = format!("{}x{}", count, n_bins);

        group.bench_with_input(BenchmarkId::new("stratified", &label), &cells, |b, cells| {
            b.iter(|| {
                let mut work = cells.clone();
                sampler.downsample(black_box(&mut work), &[0..half, half..count], None)
            })
        });
        group.bench_with_input(BenchmarkId::new("to_count", &label), &cells, |b, cells| {
            b.iter(|| {
                let mut work = cells.clone();
                downsample_to_count(black_box(&mut work), 500.0, 11)
            })
        });
    }
    group.finish();
}

fn bench_windowing(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowing");
    group.sample_size(10);

    for (count, n_bins) in sizes() {
        let cells = generate_cells(count, n_bins, 8, 5);
        for layout in [WindowLayout::Dense, WindowLayout::Sparse] {
            let config = WindowConfig {
                off_diag: Some(20),
                layout,
                ..Default::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", layout), format!("{}x{}", count, n_bins)),
                &cells,
                |b, cells| b.iter(|| reformat(black_box(cells), 10_000, &config, None, usize::MAX)),
            );
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_aggregation,
    bench_normalization,
    bench_thinning,
    bench_windowing
);
criterion_main!(benches);
