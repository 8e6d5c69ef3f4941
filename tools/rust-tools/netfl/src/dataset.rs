use anyhow::{bail, Result};
use netfl_core::deterministic_rng;
use netfl_data_provider::DatasetDescriptor;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};

const TRAIN_STREAM: u64 = 0x7261696e;
const TEST_STREAM: u64 = 0x74657374;

/// Gaussian blobs, one per class, evenly spaced on a circle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticDatasetConfig {
    pub num_examples: usize,
    pub num_classes: u32,
    pub num_features: usize,
    /// Size of the server's held-out evaluation set.
    pub test_examples: usize,
    /// Standard deviation of every blob.
    pub spread: f64,
    /// Simulated training cost on a device worth one compute unit.
    pub work_ms_per_example: f64,
}

impl Default for SyntheticDatasetConfig {
    fn default() -> Self {
        Self {
            num_examples: 1000,
            num_classes: 4,
            num_features: 2,
            test_examples: 200,
            spread: 1.0,
            work_ms_per_example: 0.0,
        }
    }
}

impl SyntheticDatasetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 || self.num_features == 0 {
            bail!("synthetic dataset needs at least one class and one feature");
        }
        if !(self.spread.is_finite() && self.spread >= 0.0) {
            bail!("spread must be non-negative, got {}", self.spread);
        }
        if !(self.work_ms_per_example.is_finite() && self.work_ms_per_example >= 0.0) {
            bail!(
                "work_ms_per_example must be non-negative, got {}",
                self.work_ms_per_example
            );
        }
        Ok(())
    }

    pub fn generate(&self, seed: u64) -> Result<SyntheticData> {
        Ok(SyntheticData {
            train: self.samples(self.num_examples, seed, TRAIN_STREAM)?,
            test: self.samples(self.test_examples, seed, TEST_STREAM)?,
        })
    }

    fn center(&self, class: u32) -> Vec<f32> {
        let angle = TAU * class as f64 / self.num_classes as f64;
        (0..self.num_features)
            .map(|f| (4.0 * (angle + f as f64 * FRAC_PI_2).cos()) as f32)
            .collect()
    }

    fn samples(&self, len: usize, seed: u64, stream: u64) -> Result<Samples> {
        let noise = Normal::new(0.0, self.spread)?;
        let mut rng = deterministic_rng(seed, stream);
        let centers: Vec<Vec<f32>> = (0..self.num_classes).map(|c| self.center(c)).collect();

        let mut features = Vec::with_capacity(len);
        let mut labels = Vec::with_capacity(len);
        for _ in 0..len {
            let label = rng.gen_range(0..self.num_classes);
            features.push(
                centers[label as usize]
                    .iter()
                    .map(|c| c + noise.sample(&mut rng) as f32)
                    .collect(),
            );
            labels.push(label);
        }
        Ok(Samples { features, labels })
    }
}

pub struct SyntheticData {
    pub train: Samples,
    pub test: Samples,
}

pub struct Samples {
    pub features: Vec<Vec<f32>>,
    pub labels: Vec<u32>,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn descriptor(&self) -> DatasetDescriptor {
        DatasetDescriptor::new(self.labels.clone())
    }
}
