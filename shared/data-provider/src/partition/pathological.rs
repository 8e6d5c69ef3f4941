use crate::{DatasetDescriptor, PartitionError};
use netfl_core::deterministic_rng;
use rand::seq::{index::sample, SliceRandom};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassAssignmentMode {
    /// `k` distinct classes drawn at random per partition.
    #[default]
    Random,
    /// Partition `i` holds classes `i, i+1, .., i+k-1` (mod C).
    Deterministic,
    /// Partition `i` holds class `i mod C`, the remaining `k-1` are drawn at random.
    FirstDeterministic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathologicalConfig {
    pub num_classes_per_partition: usize,
    #[serde(default)]
    pub class_assignment_mode: ClassAssignmentMode,
    #[serde(default = "default_true")]
    pub shuffle: bool,
}

fn default_true() -> bool {
    true
}

impl PathologicalConfig {
    pub fn new(num_classes_per_partition: usize, mode: ClassAssignmentMode) -> Self {
        Self {
            num_classes_per_partition,
            class_assignment_mode: mode,
            shuffle: true,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

pub(super) fn assign(
    config: &PathologicalConfig,
    dataset: &DatasetDescriptor,
    num_partitions: usize,
    seed: u64,
) -> Result<Vec<Vec<usize>>, PartitionError> {
    let by_class = dataset.indices_by_class();
    let classes: Vec<u32> = by_class.keys().copied().collect();
    let k = config.num_classes_per_partition;
    if k == 0 || k > classes.len() {
        return Err(PartitionError::InvalidConfig(format!(
            "num_classes_per_partition must be in 1..={}, got {k}",
            classes.len()
        )));
    }

    let mut rng = deterministic_rng(seed, 0);
    let num_classes = classes.len();

    // positions into `classes` held by each partition
    let held: Vec<Vec<usize>> = (0..num_partitions)
        .map(|i| match config.class_assignment_mode {
            ClassAssignmentMode::Random => sample(&mut rng, num_classes, k).into_vec(),
            ClassAssignmentMode::Deterministic => {
                (0..k).map(|j| (i + j) % num_classes).collect()
            }
            ClassAssignmentMode::FirstDeterministic => {
                let first = i % num_classes;
                let mut rest: Vec<usize> = (0..num_classes).filter(|c| *c != first).collect();
                rest.shuffle(&mut rng);
                std::iter::once(first)
                    .chain(rest.into_iter().take(k - 1))
                    .collect()
            }
        })
        .collect();

    let mut holders: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (partition, positions) in held.iter().enumerate() {
        for position in positions {
            holders.entry(classes[*position]).or_default().push(partition);
        }
    }

    let mut partitions = vec![Vec::new(); num_partitions];
    for (class, indices) in &by_class {
        let Some(holders) = holders.get(class) else {
            info!(class, dropped = indices.len(), "No partition holds class, dropping its examples");
            continue;
        };
        for (n, index) in indices.iter().enumerate() {
            partitions[holders[n % holders.len()]].push(*index);
        }
    }

    if config.shuffle {
        for partition in partitions.iter_mut() {
            partition.shuffle(&mut rng);
        }
    }
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_round_robin() {
        // classes 0,1,2 with two examples each
        let dataset = DatasetDescriptor::new(vec![0, 0, 1, 1, 2, 2]);
        let config = PathologicalConfig::new(2, ClassAssignmentMode::Deterministic)
            .with_shuffle(false);
        let partitions = assign(&config, &dataset, 3, 0).unwrap();
        // p0: {0,1}, p1: {1,2}, p2: {2,0}
        assert_eq!(partitions, vec![vec![0, 2], vec![3, 4], vec![1, 5]]);
    }

    #[test]
    fn too_many_classes_per_partition() {
        let dataset = DatasetDescriptor::new(vec![0, 1]);
        let config = PathologicalConfig::new(3, ClassAssignmentMode::Random);
        assert!(matches!(
            assign(&config, &dataset, 2, 0),
            Err(PartitionError::InvalidConfig(_))
        ));
    }
}
