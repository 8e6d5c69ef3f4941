use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a partitioner needs to know about a dataset: one label per example,
/// in dataset order. Example `i` is index `i`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    labels: Vec<u32>,
}

impl DatasetDescriptor {
    pub fn new(labels: Vec<u32>) -> Self {
        Self { labels }
    }

    /// Unlabelled dataset of `len` examples, all in class 0.
    pub fn unlabelled(len: usize) -> Self {
        Self {
            labels: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Option<u32> {
        self.labels.get(index).copied()
    }

    /// Distinct labels, ascending.
    pub fn classes(&self) -> Vec<u32> {
        self.indices_by_class().into_keys().collect()
    }

    /// Dataset indices grouped by label, classes ascending and indices ascending
    /// within each class.
    pub fn indices_by_class(&self) -> BTreeMap<u32, Vec<usize>> {
        let mut by_class: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (index, label) in self.labels.iter().enumerate() {
            by_class.entry(*label).or_default().push(index);
        }
        by_class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_sorted_and_distinct() {
        let dataset = DatasetDescriptor::new(vec![3, 1, 3, 0, 1]);
        assert_eq!(dataset.classes(), vec![0, 1, 3]);
        assert_eq!(dataset.indices_by_class()[&3], vec![0, 2]);
    }
}
