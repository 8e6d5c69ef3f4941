use crate::{DatasetDescriptor, PartitionError};
use netfl_core::ClientId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from client id to the dataset indices of its shard. Client `i` owns
/// `partitions[i]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionAssignment {
    partitions: Vec<Vec<usize>>,
}

impl PartitionAssignment {
    pub fn new(partitions: Vec<Vec<usize>>) -> Self {
        Self { partitions }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition(&self, client_id: ClientId) -> Result<&[usize], PartitionError> {
        self.partitions
            .get(client_id.index())
            .map(Vec::as_slice)
            .ok_or(PartitionError::ClientOutOfRange {
                client_id,
                num_partitions: self.partitions.len(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &[usize])> {
        self.partitions
            .iter()
            .enumerate()
            .map(|(i, p)| (ClientId(i as u32), p.as_slice()))
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.partitions.iter().map(Vec::len).collect()
    }

    pub fn total_len(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    /// Number of examples of each label held by `client_id`.
    pub fn class_histogram(
        &self,
        client_id: ClientId,
        dataset: &DatasetDescriptor,
    ) -> Result<BTreeMap<u32, usize>, PartitionError> {
        let mut histogram = BTreeMap::new();
        for index in self.partition(client_id)? {
            if let Some(label) = dataset.label(*index) {
                *histogram.entry(label).or_insert(0) += 1;
            }
        }
        Ok(histogram)
    }

    pub fn into_inner(self) -> Vec<Vec<usize>> {
        self.partitions
    }
}
