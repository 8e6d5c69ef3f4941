use netfl_core::ClientId;
use netfl_data_provider::{
    ClassAssignmentMode, ClientPartition, DatasetDescriptor, DirichletConfig, PartitionError,
    PartitionStrategy, PathologicalConfig,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::{BTreeMap, BTreeSet};
use test_log::test;

/// `len` examples cycling through `classes` labels.
fn cyclic(len: usize, classes: u32) -> DatasetDescriptor {
    DatasetDescriptor::new((0..len).map(|i| i as u32 % classes).collect())
}

fn assert_disjoint(partitions: &[Vec<usize>]) -> BTreeSet<usize> {
    let mut seen = BTreeSet::new();
    for index in partitions.iter().flatten() {
        assert!(seen.insert(*index), "index {index} assigned twice");
    }
    seen
}

#[rstest]
#[case(100, 10)]
#[case(101, 10)]
#[case(7, 3)]
#[case(3, 5)]
#[case(0, 4)]
#[test_log::test]
fn iid_is_a_balanced_cover(#[case] len: usize, #[case] partitions: usize) {
    let dataset = DatasetDescriptor::unlabelled(len);
    let assignment = PartitionStrategy::Iid
        .assign(&dataset, partitions, 42)
        .unwrap();

    assert_eq!(assignment.num_partitions(), partitions);
    let seen = assert_disjoint(&assignment.clone().into_inner());
    assert_eq!(seen, (0..len).collect::<BTreeSet<_>>());

    let sizes = assignment.sizes();
    let max = sizes.iter().max().copied().unwrap_or(0);
    let min = sizes.iter().min().copied().unwrap_or(0);
    assert!(max - min <= 1, "sizes {sizes:?}");
}

#[rstest]
#[case(PartitionStrategy::Iid)]
#[case(PartitionStrategy::Dirichlet(DirichletConfig::new(0.3)))]
#[case(PartitionStrategy::Dirichlet(DirichletConfig::new(0.3).with_self_balancing(false)))]
#[case(PartitionStrategy::Pathological(PathologicalConfig::new(2, ClassAssignmentMode::Random)))]
#[case(PartitionStrategy::Pathological(PathologicalConfig::new(2, ClassAssignmentMode::FirstDeterministic)))]
#[test_log::test]
fn same_seed_same_assignment(#[case] strategy: PartitionStrategy) {
    let dataset = cyclic(500, 10);
    let a = strategy.assign(&dataset, 8, 7).unwrap();
    let b = strategy.assign(&dataset, 8, 7).unwrap();
    assert_eq!(a, b);
}

#[test]
fn different_seeds_differ() {
    let dataset = DatasetDescriptor::unlabelled(200);
    let a = PartitionStrategy::Iid.assign(&dataset, 4, 1).unwrap();
    let b = PartitionStrategy::Iid.assign(&dataset, 4, 2).unwrap();
    assert_ne!(a, b);
}

#[rstest]
#[case(0.05)]
#[case(0.5)]
#[case(100.0)]
#[test_log::test]
fn dirichlet_balanced_has_no_empty_partitions(#[case] alpha: f64) {
    let dataset = cyclic(300, 10);
    let strategy = PartitionStrategy::Dirichlet(DirichletConfig::new(alpha));
    for seed in 0..5 {
        let assignment = strategy.assign(&dataset, 20, seed).unwrap();
        let seen = assert_disjoint(&assignment.clone().into_inner());
        assert_eq!(seen.len(), 300);
        assert!(assignment.sizes().iter().all(|s| *s >= 1));
    }
}

#[test]
fn dirichlet_min_partition_size_is_honoured() {
    let dataset = cyclic(200, 4);
    let strategy =
        PartitionStrategy::Dirichlet(DirichletConfig::new(0.1).with_min_partition_size(15));
    let assignment = strategy.assign(&dataset, 10, 3).unwrap();
    assert!(assignment.sizes().iter().all(|s| *s >= 15));
    assert_eq!(assignment.total_len(), 200);
}

#[test]
fn dirichlet_unsatisfiable_minimum() {
    let dataset = cyclic(20, 2);
    let balanced =
        PartitionStrategy::Dirichlet(DirichletConfig::new(1.0).with_min_partition_size(11));
    assert!(matches!(
        balanced.assign(&dataset, 2, 0),
        Err(PartitionError::InvalidConfig(_))
    ));

    let unbalanced = PartitionStrategy::Dirichlet(
        DirichletConfig::new(1.0)
            .with_min_partition_size(11)
            .with_self_balancing(false),
    );
    assert_eq!(
        unbalanced.assign(&dataset, 2, 0),
        Err(PartitionError::MinPartitionSizeNotReached {
            min_partition_size: 11,
            trials: netfl_data_provider::DIRICHLET_MAX_TRIALS,
        })
    );
}

#[test]
fn dirichlet_unshuffled_partitions_are_sorted() {
    let dataset = cyclic(100, 5);
    let strategy = PartitionStrategy::Dirichlet(DirichletConfig::new(1.0).with_shuffle(false));
    for (_, indices) in strategy.assign(&dataset, 4, 9).unwrap().iter() {
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }
}

#[rstest]
#[case(ClassAssignmentMode::Random)]
#[case(ClassAssignmentMode::Deterministic)]
#[case(ClassAssignmentMode::FirstDeterministic)]
#[test_log::test]
fn pathological_limits_classes_per_partition(#[case] mode: ClassAssignmentMode) {
    let dataset = cyclic(400, 10);
    let strategy = PartitionStrategy::Pathological(PathologicalConfig::new(2, mode));
    let assignment = strategy.assign(&dataset, 10, 11).unwrap();
    assert_disjoint(&assignment.clone().into_inner());

    let mut per_class: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for client in 0..10 {
        let histogram = assignment
            .class_histogram(ClientId(client), &dataset)
            .unwrap();
        assert_eq!(histogram.len(), 2, "client {client}: {histogram:?}");
        for (class, count) in histogram {
            per_class.entry(class).or_default().push(count);
        }
    }
    // each class is dealt round-robin over the partitions holding it
    for (class, counts) in per_class {
        let min = counts.iter().min().unwrap();
        let max = counts.iter().max().unwrap();
        assert!(max - min <= 1, "class {class}: {counts:?}");
        assert_eq!(counts.iter().sum::<usize>(), 40, "class {class}");
    }
}

#[test]
fn pathological_first_deterministic_first_class() {
    let dataset = cyclic(100, 5);
    let strategy = PartitionStrategy::Pathological(PathologicalConfig::new(
        2,
        ClassAssignmentMode::FirstDeterministic,
    ));
    let assignment = strategy.assign(&dataset, 5, 0).unwrap();
    for client in 0..5u32 {
        let histogram = assignment
            .class_histogram(ClientId(client), &dataset)
            .unwrap();
        assert!(histogram.contains_key(&client));
    }
}

#[test]
fn strategy_from_toml() {
    let strategy: PartitionStrategy = toml::from_str(
        r#"
        name = "pathological"
        num_classes_per_partition = 3
        class_assignment_mode = "first-deterministic"
        "#,
    )
    .unwrap();
    assert_eq!(
        strategy,
        PartitionStrategy::Pathological(PathologicalConfig::new(
            3,
            ClassAssignmentMode::FirstDeterministic
        ))
    );

    let strategy: PartitionStrategy = toml::from_str("name = \"dirichlet\"\nalpha = 0.5").unwrap();
    assert_eq!(strategy, PartitionStrategy::Dirichlet(DirichletConfig::new(0.5)));
}

#[test]
fn out_of_range_client() {
    let dataset = DatasetDescriptor::unlabelled(10);
    let assignment = PartitionStrategy::Iid.assign(&dataset, 2, 0).unwrap();
    assert_eq!(
        ClientPartition::split(&assignment, ClientId(2), 0.2, 0, true),
        Err(PartitionError::ClientOutOfRange {
            client_id: ClientId(2),
            num_partitions: 2,
        })
    );
}
