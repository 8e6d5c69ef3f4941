use serde::{Deserialize, Serialize};

/// The global model, as the coordinator sees it: a list of flat layers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub layers: Vec<Vec<f32>>,
}

impl Parameters {
    pub fn new(layers: Vec<Vec<f32>>) -> Self {
        Self { layers }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            layers: shape.iter().map(|len| vec![0.0; *len]).collect(),
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        self.layers.iter().map(Vec::len).collect()
    }

    pub fn same_shape(&self, other: &Parameters) -> bool {
        self.layers.len() == other.layers.len()
            && self
                .layers
                .iter()
                .zip(&other.layers)
                .all(|(a, b)| a.len() == b.len())
    }

    pub fn num_values(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_values() == 0
    }
}
