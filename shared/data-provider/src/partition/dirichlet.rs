use crate::{DatasetDescriptor, PartitionError};
use netfl_core::deterministic_rng;
use rand::{seq::SliceRandom, Rng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

/// How many times the class proportions are redrawn, without self-balancing, before
/// giving up on `min_partition_size`.
pub const DIRICHLET_MAX_TRIALS: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirichletConfig {
    /// Concentration; small values give very skewed label distributions.
    pub alpha: f64,
    #[serde(default)]
    pub min_partition_size: usize,
    #[serde(default = "default_true")]
    pub self_balancing: bool,
    #[serde(default = "default_true")]
    pub shuffle: bool,
}

fn default_true() -> bool {
    true
}

impl DirichletConfig {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            min_partition_size: 0,
            self_balancing: true,
            shuffle: true,
        }
    }

    pub fn with_min_partition_size(mut self, min_partition_size: usize) -> Self {
        self.min_partition_size = min_partition_size;
        self
    }

    pub fn with_self_balancing(mut self, self_balancing: bool) -> Self {
        self.self_balancing = self_balancing;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

pub(super) fn assign(
    config: &DirichletConfig,
    dataset: &DatasetDescriptor,
    num_partitions: usize,
    seed: u64,
) -> Result<Vec<Vec<usize>>, PartitionError> {
    if !(config.alpha.is_finite() && config.alpha > 0.0) {
        return Err(PartitionError::InvalidConfig(format!(
            "alpha must be positive, got {}",
            config.alpha
        )));
    }
    let gamma = Gamma::new(config.alpha, 1.0)
        .map_err(|e| PartitionError::InvalidConfig(format!("alpha {}: {e}", config.alpha)))?;

    let len = dataset.len();
    // with self-balancing, an empty partition is never acceptable when there are
    // enough examples to go around
    let floor = match config.self_balancing {
        true => config.min_partition_size.max(usize::from(len >= num_partitions)),
        false => config.min_partition_size,
    };
    if config.self_balancing && config.min_partition_size > len / num_partitions {
        return Err(PartitionError::InvalidConfig(format!(
            "min_partition_size {} cannot be met with {len} examples over {num_partitions} partitions",
            config.min_partition_size
        )));
    }

    let by_class = dataset.indices_by_class();
    let mut rng = deterministic_rng(seed, 0);
    let trials = match config.self_balancing {
        true => 1,
        false => DIRICHLET_MAX_TRIALS,
    };

    for _ in 0..trials {
        let mut partitions = vec![Vec::new(); num_partitions];
        for indices in by_class.values() {
            let mut indices = indices.clone();
            indices.shuffle(&mut rng);
            let proportions = sample_proportions(&gamma, num_partitions, &mut rng);
            let mut start = 0;
            for (partition, count) in partitions
                .iter_mut()
                .zip(apportion(indices.len(), &proportions))
            {
                partition.extend_from_slice(&indices[start..start + count]);
                start += count;
            }
        }

        if config.self_balancing {
            rebalance(&mut partitions, floor);
        } else if partitions.iter().any(|p| p.len() < floor) {
            continue;
        }

        for partition in partitions.iter_mut() {
            match config.shuffle {
                true => partition.shuffle(&mut rng),
                false => partition.sort_unstable(),
            }
        }
        return Ok(partitions);
    }

    Err(PartitionError::MinPartitionSizeNotReached {
        min_partition_size: config.min_partition_size,
        trials,
    })
}

/// One draw from a symmetric Dirichlet, via normalised Gamma(alpha, 1) samples.
fn sample_proportions(gamma: &Gamma<f64>, n: usize, rng: &mut ChaCha8Rng) -> Vec<f64> {
    let mut draws: Vec<f64> = (0..n).map(|_| gamma.sample(rng)).collect();
    let sum: f64 = draws.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        draws.iter_mut().for_each(|d| *d /= sum);
    } else {
        // every draw underflowed (tiny alpha): all mass on one partition
        let winner = rng.gen_range(0..n);
        draws.iter_mut().enumerate().for_each(|(i, d)| {
            *d = if i == winner { 1.0 } else { 0.0 };
        });
    }
    draws
}

/// Splits `total` by `proportions` using rounded cumulative boundaries, so counts
/// always sum to exactly `total`.
fn apportion(total: usize, proportions: &[f64]) -> Vec<usize> {
    let mut counts = Vec::with_capacity(proportions.len());
    let mut cumulative = 0.0;
    let mut previous = 0usize;
    for (i, p) in proportions.iter().enumerate() {
        cumulative += p;
        let boundary = if i + 1 == proportions.len() {
            total
        } else {
            ((cumulative * total as f64).round() as usize).clamp(previous, total)
        };
        counts.push(boundary - previous);
        previous = boundary;
    }
    counts
}

/// Moves examples from the largest partition (lowest index on ties) to the
/// lowest-indexed partition below `floor`, one at a time, until none is below.
fn rebalance(partitions: &mut [Vec<usize>], floor: usize) {
    while let Some(needy) = partitions.iter().position(|p| p.len() < floor) {
        let donor = partitions
            .iter()
            .enumerate()
            .max_by(|(i, a), (j, b)| a.len().cmp(&b.len()).then(j.cmp(i)))
            .map(|(i, _)| i);
        let Some(donor) = donor.filter(|d| partitions[*d].len() > floor) else {
            return;
        };
        if let Some(index) = partitions[donor].pop() {
            partitions[needy].push(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apportion_sums_to_total() {
        assert_eq!(apportion(10, &[0.25, 0.25, 0.5]), vec![3, 2, 5]);
        assert_eq!(apportion(7, &[1.0, 0.0]), vec![7, 0]);
        assert_eq!(apportion(0, &[0.5, 0.5]), vec![0, 0]);
    }

    #[test]
    fn rebalance_fills_empty_partitions() {
        let mut partitions = vec![vec![0, 1, 2, 3, 4], vec![], vec![5]];
        rebalance(&mut partitions, 2);
        assert_eq!(partitions, vec![vec![0, 1], vec![4, 3], vec![5, 2]]);
    }

    #[test]
    fn invalid_alpha() {
        let dataset = DatasetDescriptor::new(vec![0, 1, 0, 1]);
        for alpha in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                assign(&DirichletConfig::new(alpha), &dataset, 2, 0),
                Err(PartitionError::InvalidConfig(_))
            ));
        }
    }
}
