mod dirichlet;
mod iid;
mod pathological;

use crate::{DatasetDescriptor, PartitionAssignment, PartitionError};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use dirichlet::{DirichletConfig, DIRICHLET_MAX_TRIALS};
pub use pathological::{ClassAssignmentMode, PathologicalConfig};

/// How a dataset is carved into per-client shards.
///
/// Every variant is a pure function of `(dataset, num_partitions, seed, config)`:
/// all randomness comes from a ChaCha stream seeded by `seed`, so the same inputs
/// give the same assignment on every run and platform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum PartitionStrategy {
    /// Shuffle, then split into nearly equal contiguous chunks.
    #[default]
    Iid,
    /// Per-class proportions drawn from a symmetric Dirichlet(alpha).
    Dirichlet(DirichletConfig),
    /// Each partition only sees a fixed number of classes.
    Pathological(PathologicalConfig),
}

impl PartitionStrategy {
    pub fn assign(
        &self,
        dataset: &DatasetDescriptor,
        num_partitions: usize,
        seed: u64,
    ) -> Result<PartitionAssignment, PartitionError> {
        if num_partitions == 0 {
            return Err(PartitionError::InvalidConfig(
                "the number of partitions must be positive".to_owned(),
            ));
        }
        let partitions = match self {
            PartitionStrategy::Iid => iid::assign(dataset.len(), num_partitions, seed),
            PartitionStrategy::Dirichlet(config) => {
                dirichlet::assign(config, dataset, num_partitions, seed)?
            }
            PartitionStrategy::Pathological(config) => {
                pathological::assign(config, dataset, num_partitions, seed)?
            }
        };
        let assignment = PartitionAssignment::new(partitions);
        debug!(
            strategy = self.name(),
            num_partitions,
            seed,
            sizes = ?assignment.sizes(),
            "Partitioned dataset"
        );
        Ok(assignment)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PartitionStrategy::Iid => "iid",
            PartitionStrategy::Dirichlet(_) => "dirichlet",
            PartitionStrategy::Pathological(_) => "pathological",
        }
    }
}
