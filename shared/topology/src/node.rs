use crate::{LinkParams, ResourceBudget};
use netfl_core::ClientId;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteTier {
    Cloud,
    #[default]
    Edge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum NodeKind {
    Root,
    Site { tier: SiteTier },
    Server,
    Device,
}

impl NodeKind {
    pub const CLOUD: NodeKind = NodeKind::Site {
        tier: SiteTier::Cloud,
    };
    pub const EDGE: NodeKind = NodeKind::Site {
        tier: SiteTier::Edge,
    };

    /// Servers and devices are containers; nothing can be placed under them.
    pub fn can_have_children(&self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Site { .. })
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Root => write!(f, "root"),
            NodeKind::Site {
                tier: SiteTier::Cloud,
            } => write!(f, "cloud site"),
            NodeKind::Site {
                tier: SiteTier::Edge,
            } => write!(f, "edge site"),
            NodeKind::Server => write!(f, "server"),
            NodeKind::Device => write!(f, "device"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub budget: ResourceBudget,
    pub children: Vec<NodeId>,
    /// Set for device nodes only, assigned in insertion order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    /// Characteristics of the node's own uplink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uplink: Option<LinkParams>,
}
