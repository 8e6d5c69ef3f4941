use crate::{PartitionAssignment, PartitionError};
use netfl_core::{deterministic_rng, ClientId};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One client's shard, split into the examples it trains on and the examples it
/// keeps for local evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPartition {
    pub client_id: ClientId,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl ClientPartition {
    /// `ceil(n * test_size)` examples go to the test split. With `shuffle`, the shard
    /// is permuted first using `seed` (on a per-client stream) so the split is
    /// reproducible.
    pub fn split(
        assignment: &PartitionAssignment,
        client_id: ClientId,
        test_size: f64,
        seed: u64,
        shuffle: bool,
    ) -> Result<Self, PartitionError> {
        if !(0.0..1.0).contains(&test_size) {
            return Err(PartitionError::InvalidConfig(format!(
                "test_size must be within [0, 1), got {test_size}"
            )));
        }
        let mut indices = assignment.partition(client_id)?.to_vec();
        if shuffle {
            indices.shuffle(&mut deterministic_rng(seed, client_id.0 as u64));
        }
        let num_test = ((indices.len() as f64) * test_size).ceil() as usize;
        let train = indices.split_off(num_test.min(indices.len()));
        Ok(Self {
            client_id,
            train,
            test: indices,
        })
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.test.is_empty()
    }
}
