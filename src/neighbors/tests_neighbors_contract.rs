// =========================================================================
// FALSIFY-NS: neighbor-occurrence-v1.yaml contract (vecindad neighbors)
//
// Five-Whys (PMAT-354):
//   Why 1: vecindad had no inline FALSIFY-NS-* tests for neighbor sets
//   Why 2: neighbor tests exist but lack contract-mapped FALSIFY naming
//   Why 3: no mapping from neighbor-occurrence-v1.yaml to inline test names
//   Why 4: occurrence counting predates the inline FALSIFY convention
//   Why 5: frequency conservation was "obviously correct" (one slot, one count)
//
// References:
//   - provable-contracts/contracts/neighbor-occurrence-v1.yaml
//   - Radovanović et al. (2010) "Hubs in Space: Popular Nearest Neighbors
//     in High-Dimensional Data"
// =========================================================================

use super::*;
use crate::distance::{DistanceMetric, Parallelism};
use crate::primitives::Matrix;

fn two_cluster_fixture() -> (DataSet, DistanceMatrix) {
    let features = Matrix::from_vec(
        6,
        2,
        vec![
            0.0, 0.0, //
            0.0, 1.0, //
            1.0, 0.0, //
            5.0, 5.0, //
            5.0, 6.0, //
            6.0, 5.0, //
        ],
    )
    .expect("6x2 matrix");
    let data = DataSet::new(features, vec![0, 0, 0, 1, 1, 1]).expect("matching labels");
    let matrix = DistanceMatrix::compute(&data, &DistanceMetric::Euclidean, Parallelism::auto())
        .expect("finite distances");
    (data, matrix)
}

/// FALSIFY-NS-001: two-cluster fixture produces the hand-computed lists
#[test]
fn falsify_ns_001_fixture_lists() {
    let (data, matrix) = two_cluster_fixture();
    let finder = NeighborSetFinder::calculate(&matrix, &data, 2).expect("valid k");

    let expected: [&[usize]; 6] = [&[1, 2], &[0, 2], &[0, 1], &[4, 5], &[3, 5], &[3, 4]];
    for (i, want) in expected.iter().enumerate() {
        assert_eq!(
            finder.neighbors(i),
            *want,
            "FALSIFIED NS-001: point {i} got {:?}, expected {want:?}",
            finder.neighbors(i)
        );
    }
}

/// FALSIFY-NS-002: occurrence counts sum to n * k
#[test]
fn falsify_ns_002_frequency_conservation() {
    let (data, matrix) = two_cluster_fixture();
    for k in 1..=5 {
        let finder = NeighborSetFinder::calculate(&matrix, &data, k).expect("valid k");
        let total: usize = finder.stats().occurrence_counts().iter().sum();
        assert_eq!(
            total,
            6 * k,
            "FALSIFIED NS-002: occurrence sum {total} != {} at k={k}",
            6 * k
        );
    }
}

/// FALSIFY-NS-003: good + bad == occurrence on a fully labeled set
#[test]
fn falsify_ns_003_good_bad_partition() {
    let (data, matrix) = two_cluster_fixture();
    let finder = NeighborSetFinder::calculate(&matrix, &data, 3).expect("valid k");
    for p in 0..6 {
        let split = finder.good_occurrence_count(p) + finder.bad_occurrence_count(p);
        assert_eq!(
            split,
            finder.occurrence_count(p),
            "FALSIFIED NS-003: point {p} good+bad={split}, occurrence={}",
            finder.occurrence_count(p)
        );
    }
}

/// FALSIFY-NS-004: class-conditional counts sum to the occurrence count
#[test]
fn falsify_ns_004_class_conditional_partition() {
    let (data, matrix) = two_cluster_fixture();
    let finder = NeighborSetFinder::calculate(&matrix, &data, 3).expect("valid k");
    for p in 0..6 {
        let by_class: usize = (0..finder.num_classes())
            .map(|c| finder.class_occurrence_count(p, c))
            .sum();
        assert_eq!(
            by_class,
            finder.occurrence_count(p),
            "FALSIFIED NS-004: point {p} class sum {by_class} != occurrence {}",
            finder.occurrence_count(p)
        );
    }
}

/// FALSIFY-NS-005: equal distances resolve to the lower index
#[test]
fn falsify_ns_005_tie_break_lower_index() {
    // d(0,2) == d(0,3) == 1 and d(1,2) == d(1,3) == 3.
    let matrix = DistanceMatrix::from_rows(vec![
        vec![2.0, 1.0, 1.0],
        vec![3.0, 3.0],
        vec![5.0],
        vec![],
    ])
    .expect("valid triangle");
    let features = Matrix::from_vec(4, 1, vec![0.0; 4]).expect("4x1 matrix");
    let data = DataSet::new(features, vec![0, 1, 0, 1]).expect("matching labels");

    let finder = NeighborSetFinder::calculate(&matrix, &data, 2).expect("valid k");
    assert_eq!(
        finder.neighbors(0),
        &[2, 3],
        "FALSIFIED NS-005: tie at distance 1 must keep index 2 before 3"
    );
    assert_eq!(
        finder.neighbors(1),
        &[0, 2],
        "FALSIFIED NS-005: tie at distance 3 must prefer index 2"
    );
}

/// FALSIFY-NS-006: sub_k equals a fresh calculation at the smaller k
#[test]
fn falsify_ns_006_sub_k_equivalence() {
    let (data, matrix) = two_cluster_fixture();
    let finder = NeighborSetFinder::calculate(&matrix, &data, 4).expect("valid k");
    for k in 1..=4 {
        let truncated = finder.sub_k(k).expect("k within range");
        let fresh = NeighborSetFinder::calculate(&matrix, &data, k).expect("valid k");
        assert_eq!(
            truncated, fresh,
            "FALSIFIED NS-006: sub_k({k}) differs from fresh calculation"
        );
    }
}

/// FALSIFY-NS-007: sampled search at alpha = 1.0 equals exact calculation
#[test]
fn falsify_ns_007_full_quality_approximation_is_exact() {
    let (data, matrix) = two_cluster_fixture();
    let exact = NeighborSetFinder::calculate(&matrix, &data, 3).expect("valid k");
    let search = SampledSearch::new(DistanceMetric::Euclidean, 1.0, 31).expect("valid alpha");
    let approx = NeighborSetFinder::approximate(&data, &search, 3).expect("valid k");
    assert_eq!(
        exact, approx,
        "FALSIFIED NS-007: alpha=1.0 approximation diverged from exact"
    );
}

mod ns_proptest_falsify {
    use super::*;
    use proptest::prelude::*;

    fn build_set(positions: &[f32]) -> (DataSet, DistanceMatrix) {
        let n = positions.len();
        let features = Matrix::from_vec(n, 1, positions.to_vec()).expect("n x 1 matrix");
        let labels = (0..n).map(|i| (i % 3) as i32).collect();
        let data = DataSet::new(features, labels).expect("matching labels");
        let matrix =
            DistanceMatrix::compute(&data, &DistanceMetric::Euclidean, Parallelism::auto())
                .expect("finite distances");
        (data, matrix)
    }

    /// FALSIFY-NS-002-prop: frequency conservation for random sets
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn falsify_ns_002_prop_conservation(
            positions in proptest::collection::vec(-100.0f32..100.0, 8..=24),
            k in 1..=5usize,
        ) {
            let (data, matrix) = build_set(&positions);
            let k = k.min(data.n_points() - 1);
            let finder = NeighborSetFinder::calculate(&matrix, &data, k)
                .expect("valid k");
            let total: usize = finder.stats().occurrence_counts().iter().sum();
            prop_assert_eq!(
                total,
                data.n_points() * k,
                "FALSIFIED NS-002-prop: sum {} != n*k {}",
                total, data.n_points() * k
            );
        }
    }

    /// FALSIFY-NS-006-prop: sub_k equivalence for random sets
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn falsify_ns_006_prop_sub_k(
            positions in proptest::collection::vec(-100.0f32..100.0, 8..=24),
            k in 2..=6usize,
        ) {
            let (data, matrix) = build_set(&positions);
            let k = k.min(data.n_points() - 1);
            let finder = NeighborSetFinder::calculate(&matrix, &data, k)
                .expect("valid k");
            let small = 1 + (k - 1) / 2;
            let truncated = finder.sub_k(small).expect("k within range");
            let fresh = NeighborSetFinder::calculate(&matrix, &data, small)
                .expect("valid k");
            prop_assert_eq!(
                truncated, fresh,
                "FALSIFIED NS-006-prop: sub_k({}) != fresh", small
            );
        }
    }
}
