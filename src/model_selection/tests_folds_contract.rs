// =========================================================================
// FALSIFY-SF: stratified-folds-v1.yaml contract (vecindad model_selection)
//
// Five-Whys (PMAT-354):
//   Why 1: vecindad had no inline FALSIFY-SF-* tests for fold generation
//   Why 2: fold tests exist but lack contract-mapped FALSIFY naming
//   Why 3: no mapping from stratified-folds-v1.yaml to inline test names
//   Why 4: fold generation predates the inline FALSIFY convention
//   Why 5: the partition property was "obviously correct" (deal then union)
//
// References:
//   - provable-contracts/contracts/stratified-folds-v1.yaml
//   - Kohavi (1995) "A Study of Cross-Validation and Bootstrap for
//     Accuracy Estimation and Model Selection"
// =========================================================================

use super::*;
use crate::error::VecindadError;

/// 100 points, 4 balanced classes of 25.
fn four_class_labels() -> Vec<i32> {
    (0..100).map(|i| (i % 4) as i32).collect()
}

/// FALSIFY-SF-001: every split is a disjoint cover of the index range
#[test]
fn falsify_sf_001_partition_property() {
    let labels = four_class_labels();
    let assignments = RepeatedStratifiedFolds::new(3, 5)
        .with_random_state(42)
        .generate(&labels)
        .expect("balanced labels");

    for (t, run) in assignments.runs().iter().enumerate() {
        for (f, split) in run.iter().enumerate() {
            assert_eq!(
                split.train.len(),
                80,
                "FALSIFIED SF-001: run {t} fold {f} train size {}",
                split.train.len()
            );
            assert_eq!(
                split.test.len(),
                20,
                "FALSIFIED SF-001: run {t} fold {f} test size {}",
                split.test.len()
            );
            let mut union: Vec<usize> =
                split.train.iter().chain(split.test.iter()).copied().collect();
            union.sort_unstable();
            assert_eq!(
                union,
                (0..100).collect::<Vec<_>>(),
                "FALSIFIED SF-001: run {t} fold {f} is not a partition of 0..100"
            );
        }
    }
}

/// FALSIFY-SF-002: every class appears in both sides of every fold
#[test]
fn falsify_sf_002_class_coverage() {
    let labels = four_class_labels();
    let assignments = RepeatedStratifiedFolds::new(3, 5)
        .with_random_state(42)
        .generate(&labels)
        .expect("balanced labels");

    for (t, run) in assignments.runs().iter().enumerate() {
        for (f, split) in run.iter().enumerate() {
            for class in 0..4 {
                let in_train = split.train.iter().any(|&i| labels[i] == class);
                let in_test = split.test.iter().any(|&i| labels[i] == class);
                assert!(
                    in_train && in_test,
                    "FALSIFIED SF-002: run {t} fold {f} misses class {class} \
                     (train: {in_train}, test: {in_test})"
                );
            }
        }
    }
}

/// FALSIFY-SF-003: balanced classes deal evenly into every test fold
#[test]
fn falsify_sf_003_proportional_representation() {
    let labels = four_class_labels();
    let assignments = RepeatedStratifiedFolds::new(2, 5)
        .with_random_state(9)
        .generate(&labels)
        .expect("balanced labels");

    // 25 members per class over 5 folds is exactly 5 per fold.
    for run in assignments.runs() {
        for split in run {
            for class in 0..4 {
                let count = split.test.iter().filter(|&&i| labels[i] == class).count();
                assert_eq!(
                    count, 5,
                    "FALSIFIED SF-003: test fold holds {count} of class {class}, expected 5"
                );
            }
        }
    }
}

/// FALSIFY-SF-004: the same seed reproduces identical assignments
#[test]
fn falsify_sf_004_seeded_determinism() {
    let labels = four_class_labels();
    let generator = RepeatedStratifiedFolds::new(3, 5).with_random_state(1234);
    let first = generator.generate(&labels).expect("balanced labels");
    let second = generator.generate(&labels).expect("balanced labels");
    assert_eq!(
        first, second,
        "FALSIFIED SF-004: two generations with seed 1234 diverged"
    );
}

/// FALSIFY-SF-005: catalog persistence round-trips bit-identical partitions
#[test]
fn falsify_sf_005_round_trip() {
    let labels = four_class_labels();
    let assignments = RepeatedStratifiedFolds::new(3, 5)
        .with_random_state(77)
        .generate(&labels)
        .expect("balanced labels");
    let mut catalog = FoldCatalog::new();
    catalog.insert("scenario-c", assignments.clone());

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("catalog.json");
    catalog.save(&path).expect("save");
    let restored = FoldCatalog::load(&path).expect("load");

    let reloaded = restored
        .get("scenario-c", 3, 5)
        .expect("stored entry survives the round trip");
    for t in 0..3 {
        for f in 0..5 {
            assert_eq!(
                reloaded.split(t, f),
                assignments.split(t, f),
                "FALSIFIED SF-005: run {t} fold {f} changed across save/load"
            );
        }
    }
}

/// FALSIFY-SF-006: uncoverable classes exhaust retries into DegenerateData
#[test]
fn falsify_sf_006_retry_exhaustion() {
    // A singleton class can never appear on both sides of every fold.
    let labels = vec![0, 0, 0, 0, 1];
    let err = RepeatedStratifiedFolds::new(1, 2)
        .with_random_state(0)
        .with_max_retries(10)
        .generate(&labels)
        .unwrap_err();
    assert!(
        matches!(err, VecindadError::DegenerateData { .. }),
        "FALSIFIED SF-006: expected DegenerateData, got {err}"
    );
}

mod sf_proptest_falsify {
    use super::*;
    use proptest::prelude::*;

    fn labels_from_counts(counts: &[usize]) -> Vec<i32> {
        counts
            .iter()
            .enumerate()
            .flat_map(|(class, &count)| std::iter::repeat(class as i32).take(count))
            .collect()
    }

    /// FALSIFY-SF-001-prop: partition and coverage for random class sizes
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn falsify_sf_001_prop_partition_and_coverage(
            counts in proptest::collection::vec(5..=12usize, 2..=4),
            seed in 0..1000u64,
        ) {
            let labels = labels_from_counts(&counts);
            let n = labels.len();
            let assignments = RepeatedStratifiedFolds::new(2, 5)
                .with_random_state(seed)
                .generate(&labels)
                .expect("every class has at least 5 members");

            for run in assignments.runs() {
                for split in run {
                    let mut union: Vec<usize> = split
                        .train
                        .iter()
                        .chain(split.test.iter())
                        .copied()
                        .collect();
                    union.sort_unstable();
                    prop_assert_eq!(
                        union,
                        (0..n).collect::<Vec<_>>(),
                        "FALSIFIED SF-001-prop: not a partition"
                    );
                    for class in 0..counts.len() as i32 {
                        prop_assert!(
                            split.train.iter().any(|&i| labels[i] == class)
                                && split.test.iter().any(|&i| labels[i] == class),
                            "FALSIFIED SF-001-prop: class {} uncovered", class
                        );
                    }
                }
            }
        }
    }

    /// FALSIFY-SF-004-prop: determinism holds for arbitrary seeds
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn falsify_sf_004_prop_determinism(seed in 0..10_000u64) {
            let labels: Vec<i32> = (0..40).map(|i| (i % 2) as i32).collect();
            let generator = RepeatedStratifiedFolds::new(2, 4).with_random_state(seed);
            let first = generator.generate(&labels).expect("balanced labels");
            let second = generator.generate(&labels).expect("balanced labels");
            prop_assert_eq!(
                first, second,
                "FALSIFIED SF-004-prop: seed {} not reproducible", seed
            );
        }
    }
}
