//! Property-based tests over small random contact matrices

use hicnorm::{
    downsample_to_count, reformat, BulkAggregator, Epsilons, NormalizerSpec, PerCellNormalizer,
    SparseContactMatrix, WindowConfig, WindowLayout,
};
use ndarray::Array2;
use proptest::collection::vec;
use proptest::prelude::*;

type Entries = Vec<(usize, usize, u32)>;

fn build(n: usize, entries: &Entries) -> SparseContactMatrix {
    let (mut row, mut col, mut data) = (Vec::new(), Vec::new(), Vec::new());
    for &(i, j, v) in entries {
        row.push(i.min(j));
        col.push(i.max(j));
        data.push(v as f64);
    }
    SparseContactMatrix::from_upper_triangle(n, row, col, data).unwrap()
}

/// One matrix: dimension plus upper-triangle entries
fn matrix_strategy() -> impl Strategy<Value = SparseContactMatrix> {
    (1usize..8)
        .prop_flat_map(|n| (Just(n), vec((0..n, 0..n, 1u32..20), 0..20)))
        .prop_map(|(n, entries)| build(n, &entries))
}

/// A collection of matrices sharing one dimension
fn collection_strategy() -> impl Strategy<Value = Vec<SparseContactMatrix>> {
    (1usize..8)
        .prop_flat_map(|n| (Just(n), vec(vec((0..n, 0..n, 1u32..20), 0..20), 1..6)))
        .prop_map(|(n, cells)| cells.iter().map(|entries| build(n, entries)).collect())
}

proptest! {
    #[test]
    fn prop_bulk_matches_dense_mean(matrices in collection_strategy()) {
        let bulk = BulkAggregator::new(usize::MAX, 2).aggregate(&matrices).unwrap();

        let n = matrices[0].n_bins();
        let mut oracle = Array2::zeros((n, n));
        for m in &matrices {
            oracle += &m.to_dense();
        }
        oracle /= matrices.len() as f64;

        for (x, y) in bulk.iter().zip(oracle.iter()) {
            prop_assert!((x - y).abs() < 1.0e-10);
        }
    }

    #[test]
    fn prop_coverage_scale_keeps_mass_and_symmetry(mut matrices in collection_strategy()) {
        let totals: Vec<f64> = matrices.iter().map(SparseContactMatrix::sum).collect();
        let pipeline = PerCellNormalizer::new(
            vec![NormalizerSpec::SquareRootCoverage.build(&Epsilons::default())],
            Vec::new(),
        );
        pipeline.run(&mut matrices, None, None).unwrap();

        for (m, total) in matrices.iter().zip(&totals) {
            prop_assert!(m.is_symmetric());
            prop_assert!((m.sum() - total).abs() < 1.0e-9 * total.max(1.0));
        }
    }

    #[test]
    fn prop_thinning_never_adds_contacts(
        original in matrix_strategy(),
        count in 0.0f64..100.0,
        seed in any::<u64>(),
    ) {
        let mut matrices = vec![original.clone()];
        downsample_to_count(&mut matrices, count, seed).unwrap();

        let thinned = &matrices[0];
        let dense = original.to_dense();
        prop_assert!(thinned.is_symmetric());
        for (i, j, v) in thinned.iter() {
            prop_assert!(v > 0.0);
            prop_assert!(v <= dense[[i, j]].floor());
        }
        if original.sum() <= count {
            prop_assert_eq!(thinned, &original);
        }
    }

    #[test]
    fn prop_window_round_trip(m in matrix_strategy(), sparse in any::<bool>()) {
        // keep only contacts a full-width window can hold
        let w = (m.n_bins() - 1) / 2;
        let (mut row, mut col, mut data) = (Vec::new(), Vec::new(), Vec::new());
        for (i, j, v) in m.upper_iter().filter(|&(i, j, _)| j - i <= w) {
            row.push(i);
            col.push(j);
            data.push(v);
        }
        let banded = SparseContactMatrix::from_upper_triangle(m.n_bins(), row, col, data).unwrap();

        let config = WindowConfig {
            off_diag: Some(w),
            layout: if sparse { WindowLayout::Sparse } else { WindowLayout::Dense },
            ..Default::default()
        };
        let batch =
            reformat(std::slice::from_ref(&banded), 10_000, &config, None, usize::MAX).unwrap();
        prop_assert_eq!(batch.shape.patch, 2 * w + 1);
        prop_assert_eq!(batch.reconstruct(0).unwrap(), banded);
    }
}
