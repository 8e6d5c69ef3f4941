mod budget;
mod builder;
mod config;
mod error;
mod link;
mod node;
mod topology;

pub use budget::{HostProfile, ResourceBudget};
pub use builder::TopologyBuilder;
pub use config::{DeviceGroupConfig, LinkConfig, NodeConfig, SiteConfig, TopologyConfig};
pub use error::TopologyError;
pub use link::{Link, LinkParams};
pub use node::{NodeId, NodeKind, SiteTier, TopologyNode};
pub use topology::{Topology, TopologyDescription};
