use crate::{Link, NodeId, NodeKind, ResourceBudget, TopologyNode};
use netfl_core::ClientId;
use serde::{Deserialize, Serialize};
use std::{fmt::Write, sync::Arc};

/// What gets handed to the execution backend: every node, flattened in creation
/// order, plus the links between them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopologyDescription {
    pub nodes: Vec<TopologyNode>,
    pub links: Vec<Link>,
}

#[derive(Debug)]
struct TopologyInner {
    description: TopologyDescription,
    server: NodeId,
    devices: Vec<NodeId>,
}

/// Finalized, read-only topology. Clones share the same snapshot.
#[derive(Clone, Debug)]
pub struct Topology {
    inner: Arc<TopologyInner>,
}

impl Topology {
    pub(crate) fn new(
        nodes: Vec<TopologyNode>,
        links: Vec<Link>,
        server: NodeId,
        devices: Vec<NodeId>,
    ) -> Self {
        Self {
            inner: Arc::new(TopologyInner {
                description: TopologyDescription { nodes, links },
                server,
                devices,
            }),
        }
    }

    pub fn root(&self) -> &TopologyNode {
        // a finalized topology always has its root at index 0
        &self.inner.description.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> Option<&TopologyNode> {
        self.inner.description.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[TopologyNode] {
        &self.inner.description.nodes
    }

    pub fn find(&self, name: &str) -> Option<&TopologyNode> {
        self.nodes().iter().find(|n| n.name == name)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &TopologyNode> {
        self.node(id)
            .into_iter()
            .flat_map(|n| n.children.iter())
            .filter_map(|c| self.node(*c))
    }

    pub fn server(&self) -> &TopologyNode {
        &self.inner.description.nodes[self.inner.server.0]
    }

    pub fn devices(&self) -> &[NodeId] {
        &self.inner.devices
    }

    pub fn device(&self, client_id: ClientId) -> Option<&TopologyNode> {
        self.inner
            .devices
            .get(client_id.index())
            .and_then(|id| self.node(*id))
    }

    pub fn client_ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.inner
            .devices
            .iter()
            .filter_map(|id| self.node(*id).and_then(|n| n.client_id))
    }

    pub fn num_clients(&self) -> usize {
        self.inner.devices.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.inner.description.links
    }

    pub fn total_budget(&self) -> ResourceBudget {
        self.root().budget
    }

    pub fn description(&self) -> &TopologyDescription {
        &self.inner.description
    }

    /// Indented tree of every node and its budget, followed by the links.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        self.write_subtree(&mut out, self.root(), 0);
        for link in self.links() {
            let name = |id: NodeId| self.node(id).map(|n| n.name.as_str()).unwrap_or("?");
            let _ = writeln!(
                out,
                "link {} <-> {}: bw={} delay={}ms loss={}%",
                name(link.endpoint_a),
                name(link.endpoint_b),
                link.params.bandwidth,
                link.params.delay_ms,
                link.params.loss
            );
        }
        out
    }

    fn write_subtree(&self, out: &mut String, node: &TopologyNode, depth: usize) {
        let _ = write!(out, "{}{} [{}] {}", "  ".repeat(depth), node.name, node.kind, node.budget);
        if let Some(client_id) = node.client_id {
            let _ = write!(out, " client_id={client_id}");
        }
        out.push('\n');
        for child in self.children(node.id) {
            self.write_subtree(out, child, depth + 1);
        }
    }

    pub fn sites(&self) -> impl Iterator<Item = &TopologyNode> {
        self.nodes()
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Site { .. }))
    }
}

impl Serialize for Topology {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.description.serialize(serializer)
    }
}
