//! Integration tests for binomial thinning
//!
//! Statistical checks average over many seeded draws, so they are
//! deterministic for a given seed and far from their tolerances.

use hicnorm::{
    downsample_to_count, partition_from_labels, run_in_pool, stratum_totals, BulkAggregator,
    DownsampleConfig, DownsampleMode, SparseContactMatrix, StratifiedDownsampler,
};

/// `n × n` matrix with `value` at every upper entry up to distance `band`
fn banded(n: usize, band: usize, value: f64) -> SparseContactMatrix {
    let (mut row, mut col, mut data) = (Vec::new(), Vec::new(), Vec::new());
    for i in 0..n {
        for j in i..n.min(i + band + 1) {
            row.push(i);
            col.push(j);
            data.push(value);
        }
    }
    SparseContactMatrix::from_upper_triangle(n, row, col, data).unwrap()
}

fn check_thinned(m: &SparseContactMatrix, original: &SparseContactMatrix) {
    assert!(m.is_symmetric());
    let dense = original.to_dense();
    for (i, j, v) in m.iter() {
        assert!(v > 0.0);
        assert_eq!(v.fract(), 0.0);
        assert!(v <= dense[[i, j]]);
    }
}

#[test]
fn test_global_target_scenario() {
    let _ = pretty_env_logger::try_init();
    // 5x5, diagonal 4 + ten upper off-diagonal entries of 4, total 100
    let original = banded(5, 4, 4.0);
    assert_eq!(original.sum(), 100.0);

    let trials = 200;
    let mut grand_total = 0.0;
    for seed in 0..trials {
        let mut matrices = vec![original.clone(), original.clone(), original.clone()];
        downsample_to_count(&mut matrices, 50.0, seed).unwrap();
        for m in &matrices {
            check_thinned(m, &original);
            grand_total += m.sum();
        }
    }

    let mean = grand_total / (3 * trials) as f64;
    assert!((mean - 50.0).abs() < 5.0, "mean total {}", mean);
}

#[test]
fn test_stratified_groups_meet_target() {
    let deep = banded(8, 3, 20.0);
    let shallow = banded(8, 3, 10.0);
    let mut matrices: Vec<_> = (0..40)
        .map(|_| deep.clone())
        .chain((0..40).map(|_| shallow.clone()))
        .collect();
    let labels: Vec<&str> = (0..80).map(|k| if k < 40 { "deep" } else { "shallow" }).collect();
    let groups = partition_from_labels(&labels).unwrap();

    let sampler = StratifiedDownsampler::new(&DownsampleConfig {
        seed: 17,
        ..Default::default()
    });
    let report = sampler.downsample(&mut matrices, &groups, None).unwrap();

    assert_eq!(report.skipped_groups, vec![1]);
    assert_eq!(report.empty_strata, 4);
    for k in 0..4 {
        assert_eq!(report.rates[0][k], Some(0.5));
    }

    let aggregator = BulkAggregator::default();
    let thinned = stratum_totals(&aggregator.aggregate(&matrices[..40]).unwrap()).unwrap();
    let target = stratum_totals(&shallow.to_dense()).unwrap();
    for k in 0..4 {
        let relative = (thinned[k] - target[k]).abs() / target[k];
        assert!(relative < 0.1, "stratum {}: {} vs {}", k, thinned[k], target[k]);
    }
    for m in &matrices[..40] {
        check_thinned(m, &deep);
    }
    assert!(matrices[40..].iter().all(|m| *m == shallow));
}

#[test]
fn test_thinning_is_independent_of_pool_size() {
    let original: Vec<_> = (0..16)
        .map(|k| banded(6, 2, 5.0 + k as f64))
        .collect();
    let config = DownsampleConfig {
        mode: DownsampleMode::Global,
        seed: 99,
        ..Default::default()
    };
    let groups = [0..8, 8..16];

    let mut single = original.clone();
    let mut many = original.clone();
    run_in_pool(Some(1), || {
        StratifiedDownsampler::new(&config).downsample(&mut single, &groups, None)
    })
    .unwrap();
    run_in_pool(Some(4), || {
        StratifiedDownsampler::new(&config).downsample(&mut many, &groups, None)
    })
    .unwrap();

    assert_eq!(single, many);
}

#[test]
fn test_empty_group_is_skipped() {
    let deep = banded(6, 2, 20.0);
    let shallow = banded(6, 2, 10.0);
    let mut matrices = vec![deep.clone(), shallow.clone()];

    let report = StratifiedDownsampler::default()
        .downsample(&mut matrices, &[0..1, 1..1, 1..2], None)
        .unwrap();

    assert_eq!(report.skipped_groups, vec![1, 2]);
    assert!(report.rates[1].iter().all(Option::is_none));
    assert_eq!(report.rates[0][0], Some(0.5));
    assert_eq!(report.library_sizes[1], 0.0);
    assert_eq!(matrices[1], shallow);
    check_thinned(&matrices[0], &deep);
}
