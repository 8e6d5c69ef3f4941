use crate::{
    HostProfile, LinkParams, NodeId, NodeKind, ResourceBudget, SiteTier, Topology,
    TopologyBuilder, TopologyError,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Declarative topology, as written in an experiment's TOML file.
///
/// ```toml
/// root = { compute_units = 2.0, memory_units = 3072 }
///
/// [[sites]]
/// name = "cloud"
/// tier = "cloud"
/// budget = { compute_units = 1.0, memory_units = 1024 }
/// server = { budget = { compute_units = 1.0, memory_units = 1024 } }
///
/// [[sites]]
/// name = "edge_0"
/// budget = { compute_units = 1.0, memory_units = 2048 }
/// devices = [{ name = "pi3", count = 2, budget = { compute_units = 0.5, memory_units = 1024 } }]
///
/// [[links]]
/// a = "cloud"
/// b = "edge_0"
/// bandwidth = 10.0
/// delay_ms = 100
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub root: ResourceBudget,
    #[serde(default)]
    pub max_devices: Option<usize>,
    #[serde(default)]
    pub allow_oversubscription: bool,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    #[serde(default)]
    pub tier: SiteTier,
    pub budget: ResourceBudget,
    #[serde(default)]
    pub server: Option<NodeConfig>,
    #[serde(default)]
    pub devices: Vec<DeviceGroupConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub budget: Option<ResourceBudget>,
    #[serde(default)]
    pub profile: Option<HostProfile>,
    #[serde(default)]
    pub uplink: Option<LinkParams>,
}

/// `count` identical devices; with a `name`, they are called `<name>_0`, `<name>_1`, ...
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceGroupConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub budget: Option<ResourceBudget>,
    #[serde(default)]
    pub profile: Option<HostProfile>,
    #[serde(default)]
    pub uplink: Option<LinkParams>,
}

fn default_count() -> usize {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub a: String,
    pub b: String,
    #[serde(flatten)]
    pub params: LinkParams,
}

fn resolve_budget(
    label: &str,
    budget: Option<ResourceBudget>,
    profile: Option<HostProfile>,
) -> Result<ResourceBudget, TopologyError> {
    budget
        .or(profile.map(ResourceBudget::from))
        .ok_or_else(|| TopologyError::MissingBudget(label.to_owned()))
}

impl TopologyConfig {
    /// Builds sites first, then the server, then every device group, so that the
    /// server always exists before the first device regardless of site order.
    pub fn build(&self) -> Result<Topology, TopologyError> {
        let mut builder = TopologyBuilder::new().with_oversubscription(self.allow_oversubscription);
        if let Some(max_devices) = self.max_devices {
            builder = builder.with_max_devices(max_devices);
        }
        let root = builder.create_root(self.root)?;

        let mut sites: Vec<(NodeId, &SiteConfig)> = Vec::with_capacity(self.sites.len());
        for site in &self.sites {
            let id = builder.add_named_node(
                root,
                site.name.clone(),
                NodeKind::Site { tier: site.tier },
                site.budget,
            )?;
            sites.push((id, site));
        }

        for (site_id, site) in &sites {
            if let Some(server) = &site.server {
                let label = server.name.clone().unwrap_or_else(|| "server".to_owned());
                let budget = resolve_budget(&label, server.budget, server.profile)?;
                let id = builder.add_named_node(*site_id, label, NodeKind::Server, budget)?;
                if let Some(uplink) = &server.uplink {
                    builder.set_uplink(id, uplink.clone())?;
                }
            }
        }

        for (site_id, site) in &sites {
            for group in &site.devices {
                let label = group.name.as_deref().unwrap_or("device");
                if group.count == 0 {
                    return Err(TopologyError::EmptyDeviceGroup(label.to_owned()));
                }
                let budget = resolve_budget(label, group.budget, group.profile)?;
                for i in 0..group.count {
                    let id = match &group.name {
                        Some(name) => builder.add_named_node(
                            *site_id,
                            format!("{name}_{i}"),
                            NodeKind::Device,
                            budget,
                        )?,
                        None => builder.add_node(*site_id, NodeKind::Device, budget)?,
                    };
                    if let Some(uplink) = &group.uplink {
                        builder.set_uplink(id, uplink.clone())?;
                    }
                }
            }
        }

        for link in &self.links {
            let a = builder
                .find(&link.a)
                .ok_or_else(|| TopologyError::UnknownName(link.a.clone()))?;
            let b = builder
                .find(&link.b)
                .ok_or_else(|| TopologyError::UnknownName(link.b.clone()))?;
            builder.add_link(a, b, link.params.clone())?;
        }

        let topology = builder.finalize()?;
        info!(
            num_clients = topology.num_clients(),
            num_links = topology.links().len(),
            budget = %topology.total_budget(),
            "Topology validated"
        );
        Ok(topology)
    }
}
