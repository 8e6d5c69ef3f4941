use crate::{AggregationStrategy, ConfigError};
use netfl_core::ClientId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ROUND_TIMEOUT_MS: u64 = 600_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            batch_size: 32,
            epochs: 1,
            learning_rate: 0.01,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub num_rounds: u32,
    #[serde(default = "default_fraction_fit")]
    pub fraction_fit: f64,
    /// 0 disables federated evaluation on client test splits.
    #[serde(default)]
    pub fraction_evaluate: f64,
    pub min_available_clients: usize,
    pub max_available_clients: usize,
    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    /// Defaults to `max_available_clients`.
    #[serde(default)]
    pub num_partitions: Option<usize>,
    #[serde(default)]
    pub aggregation: AggregationStrategy,
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
}

fn default_fraction_fit() -> f64 {
    1.0
}

fn default_round_timeout_ms() -> u64 {
    DEFAULT_ROUND_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_test_size() -> f64 {
    0.2
}

impl TrainConfig {
    pub fn new(num_rounds: u32, min_available_clients: usize, max_available_clients: usize) -> Self {
        Self {
            num_rounds,
            fraction_fit: default_fraction_fit(),
            fraction_evaluate: 0.0,
            min_available_clients,
            max_available_clients,
            round_timeout_ms: DEFAULT_ROUND_TIMEOUT_MS,
            seed: 0,
            shuffle: true,
            test_size: default_test_size(),
            num_partitions: None,
            aggregation: AggregationStrategy::default(),
            hyperparameters: Hyperparameters::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        if self.min_available_clients < 2 {
            return Err(ConfigError::MinClientsTooSmall(self.min_available_clients));
        }
        if self.min_available_clients > self.max_available_clients {
            return Err(ConfigError::MinAboveMax {
                min: self.min_available_clients,
                max: self.max_available_clients,
            });
        }
        for (name, value) in [
            ("fraction_fit", self.fraction_fit),
            ("fraction_evaluate", self.fraction_evaluate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidFraction { name, value });
            }
        }
        if !(0.0..1.0).contains(&self.test_size) {
            return Err(ConfigError::InvalidTestSize(self.test_size));
        }
        if self.round_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.num_partitions() < self.max_available_clients {
            return Err(ConfigError::TooFewPartitions {
                num_partitions: self.num_partitions(),
                max: self.max_available_clients,
            });
        }
        Ok(())
    }

    /// Client ids are handed out below `max_available_clients`.
    pub fn check_client_id(&self, client_id: ClientId) -> Result<(), ConfigError> {
        match client_id.index() < self.max_available_clients {
            true => Ok(()),
            false => Err(ConfigError::ClientIdOutOfRange {
                client_id,
                max: self.max_available_clients,
            }),
        }
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions.unwrap_or(self.max_available_clients)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round_timeout_ms)
    }
}
