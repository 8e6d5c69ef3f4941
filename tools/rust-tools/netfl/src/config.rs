use anyhow::{bail, Context, Result};
use netfl_coordinator::TrainConfig;
use netfl_data_provider::PartitionStrategy;
use netfl_topology::{Topology, TopologyConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dataset::SyntheticDatasetConfig;

/// Everything one experiment needs, as laid out in its TOML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub train: TrainConfig,
    #[serde(default)]
    pub partitioner: PartitionStrategy,
    #[serde(default)]
    pub dataset: SyntheticDatasetConfig,
    pub topology: TopologyConfig,
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read experiment config {path:?}"))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse experiment config {path:?}"))
    }

    /// Checks the train config, then builds the topology. Devices can't outnumber
    /// `max_available_clients` and must be enough to reach quorum.
    pub fn validate(&self) -> Result<Topology> {
        self.train.validate().context("invalid train config")?;
        self.dataset.validate()?;

        let mut topology_config = self.topology.clone();
        let max = self.train.max_available_clients;
        topology_config.max_devices = Some(topology_config.max_devices.map_or(max, |m| m.min(max)));
        let topology = topology_config.build().context("invalid topology")?;

        if topology.num_clients() < self.train.min_available_clients {
            bail!(
                "topology has {} devices, but min_available_clients is {}",
                topology.num_clients(),
                self.train.min_available_clients
            );
        }
        for client_id in topology.client_ids() {
            self.train.check_client_id(client_id)?;
        }
        Ok(topology)
    }
}
