use crate::{
    Link, LinkParams, NodeId, NodeKind, ResourceBudget, Topology, TopologyError, TopologyNode,
};
use netfl_core::ClientId;
use std::collections::HashMap;
use tracing::debug;

/// Incrementally builds and validates a hierarchical infrastructure description.
///
/// Every mutation is checked against the current structure before anything is
/// written, so a failed call leaves the builder exactly as it was. Resource
/// accounting lives in the builder itself: each node tracks how much of its own
/// budget its children have already claimed.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    nodes: Vec<TopologyNode>,
    committed: Vec<ResourceBudget>,
    names: HashMap<String, NodeId>,
    links: Vec<Link>,
    server: Option<NodeId>,
    devices: Vec<NodeId>,
    max_devices: Option<usize>,
    allow_oversubscription: bool,
    frozen: bool,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = Some(max_devices);
        self
    }

    pub fn with_oversubscription(mut self, allow: bool) -> Self {
        self.allow_oversubscription = allow;
        self
    }

    pub fn create_root(&mut self, budget: ResourceBudget) -> Result<NodeId, TopologyError> {
        self.check_mutable()?;
        if !self.nodes.is_empty() {
            return Err(TopologyError::RootExists);
        }
        if !budget.is_valid() {
            return Err(TopologyError::InvalidBudget(budget));
        }
        Ok(self.insert(None, "root".to_owned(), NodeKind::Root, budget, None))
    }

    pub fn add_node(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        budget: ResourceBudget,
    ) -> Result<NodeId, TopologyError> {
        self.add_node_inner(parent, None, kind, budget)
    }

    pub fn add_named_node(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
        budget: ResourceBudget,
    ) -> Result<NodeId, TopologyError> {
        self.add_node_inner(parent, Some(name.into()), kind, budget)
    }

    pub fn set_uplink(&mut self, node: NodeId, params: LinkParams) -> Result<(), TopologyError> {
        self.check_mutable()?;
        self.get(node)?;
        if let Some(reason) = params.problem() {
            return Err(TopologyError::InvalidLink {
                a: node,
                b: node,
                reason,
            });
        }
        self.nodes[node.0].uplink = Some(params);
        Ok(())
    }

    pub fn add_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        params: LinkParams,
    ) -> Result<(), TopologyError> {
        self.check_mutable()?;
        self.get(a)?;
        self.get(b)?;
        if a == b {
            return Err(TopologyError::SelfLink(a));
        }
        if let Some(reason) = params.problem() {
            return Err(TopologyError::InvalidLink { a, b, reason });
        }
        debug!(a = %a, b = %b, bandwidth = params.bandwidth, "Adding link");
        self.links.push(Link {
            endpoint_a: a,
            endpoint_b: b,
            params,
        });
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    /// Validates the whole structure and hands out a read-only snapshot. The builder
    /// is frozen afterwards; on error it stays mutable and nothing is returned.
    pub fn finalize(&mut self) -> Result<Topology, TopologyError> {
        self.check_mutable()?;
        if self.nodes.is_empty() {
            return Err(TopologyError::NoRoot);
        }
        let server = self.server.ok_or(TopologyError::NoServer)?;
        if self.devices.is_empty() {
            return Err(TopologyError::NoClients);
        }
        self.frozen = true;
        Ok(Topology::new(
            self.nodes.clone(),
            self.links.clone(),
            server,
            self.devices.clone(),
        ))
    }

    fn add_node_inner(
        &mut self,
        parent: NodeId,
        name: Option<String>,
        kind: NodeKind,
        budget: ResourceBudget,
    ) -> Result<NodeId, TopologyError> {
        self.check_mutable()?;
        if self.nodes.is_empty() {
            return Err(TopologyError::NoRoot);
        }
        let parent_node = self.get(parent)?;
        if !budget.is_valid() {
            return Err(TopologyError::InvalidBudget(budget));
        }
        match kind {
            NodeKind::Root => return Err(TopologyError::RootExists),
            _ if !parent_node.kind.can_have_children() => {
                return Err(TopologyError::InvalidParent {
                    parent: parent_node.kind,
                    child: kind,
                })
            }
            NodeKind::Server if self.server.is_some() => {
                return Err(TopologyError::DuplicateServer)
            }
            NodeKind::Device if self.server.is_none() => {
                return Err(TopologyError::ServerNotCreated)
            }
            NodeKind::Device => {
                if let Some(max) = self.max_devices {
                    if self.devices.len() >= max {
                        return Err(TopologyError::MaxDevicesReached(max));
                    }
                }
            }
            _ => {}
        }

        let name = name.unwrap_or_else(|| self.default_name(kind));
        if self.names.contains_key(&name) {
            return Err(TopologyError::DuplicateName(name));
        }

        if !self.allow_oversubscription {
            let capacity = parent_node.budget;
            let committed = self.committed[parent.0];
            if !(committed + budget).fits_within(&capacity) {
                return Err(TopologyError::ResourceExceeded {
                    parent,
                    requested: budget,
                    remaining: capacity.remaining_after(&committed),
                    capacity,
                });
            }
        }

        let client_id = match kind {
            NodeKind::Device => Some(ClientId(self.devices.len() as u32)),
            _ => None,
        };
        let id = self.insert(Some(parent), name, kind, budget, client_id);
        match kind {
            NodeKind::Server => self.server = Some(id),
            NodeKind::Device => self.devices.push(id),
            _ => {}
        }
        Ok(id)
    }

    fn insert(
        &mut self,
        parent: Option<NodeId>,
        name: String,
        kind: NodeKind,
        budget: ResourceBudget,
        client_id: Option<ClientId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        debug!(node = %id, node_name = name.as_str(), %kind, %budget, "Adding node");
        self.names.insert(name.clone(), id);
        self.nodes.push(TopologyNode {
            id,
            name,
            kind,
            parent,
            budget,
            children: Vec::new(),
            client_id,
            uplink: None,
        });
        self.committed.push(ResourceBudget::ZERO);
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
            self.committed[parent.0] = self.committed[parent.0] + budget;
        }
        id
    }

    fn default_name(&self, kind: NodeKind) -> String {
        match kind {
            NodeKind::Root => "root".to_owned(),
            NodeKind::Site { .. } => format!("site_{}", self.nodes.len()),
            NodeKind::Server => "server".to_owned(),
            NodeKind::Device => format!("device_{}", self.devices.len()),
        }
    }

    fn get(&self, id: NodeId) -> Result<&TopologyNode, TopologyError> {
        self.nodes.get(id.0).ok_or(TopologyError::UnknownNode(id))
    }

    fn check_mutable(&self) -> Result<(), TopologyError> {
        match self.frozen {
            true => Err(TopologyError::Frozen),
            false => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SiteTier;

    fn cu(compute_units: f64) -> ResourceBudget {
        ResourceBudget::new(compute_units, 0)
    }

    #[test]
    fn second_child_exceeding_parent_is_rejected() {
        let mut builder = TopologyBuilder::new();
        let root = builder.create_root(cu(1.0)).unwrap();
        builder.add_node(root, NodeKind::EDGE, cu(0.6)).unwrap();
        let err = builder.add_node(root, NodeKind::EDGE, cu(0.6)).unwrap_err();
        assert!(matches!(
            err,
            TopologyError::ResourceExceeded { parent, .. } if parent == root
        ));
        // the failed call must not have claimed anything
        builder.add_node(root, NodeKind::EDGE, cu(0.4)).unwrap();
    }

    #[test]
    fn oversubscription_can_be_allowed() {
        let mut builder = TopologyBuilder::new().with_oversubscription(true);
        let root = builder.create_root(cu(1.0)).unwrap();
        builder.add_node(root, NodeKind::EDGE, cu(0.6)).unwrap();
        builder.add_node(root, NodeKind::EDGE, cu(0.6)).unwrap();
    }

    #[test]
    fn unknown_parent() {
        let mut builder = TopologyBuilder::new();
        builder.create_root(cu(1.0)).unwrap();
        assert_eq!(
            builder.add_node(NodeId(42), NodeKind::EDGE, cu(0.1)),
            Err(TopologyError::UnknownNode(NodeId(42)))
        );
    }

    #[test]
    fn requires_root_first() {
        let mut builder = TopologyBuilder::new();
        assert_eq!(
            builder.add_node(NodeId(0), NodeKind::EDGE, cu(0.1)),
            Err(TopologyError::NoRoot)
        );
        builder.create_root(cu(1.0)).unwrap();
        assert_eq!(builder.create_root(cu(1.0)), Err(TopologyError::RootExists));
    }

    #[test]
    fn single_server_before_devices() {
        let mut builder = TopologyBuilder::new();
        let root = builder.create_root(cu(4.0)).unwrap();
        let site = builder.add_node(root, NodeKind::CLOUD, cu(4.0)).unwrap();
        assert_eq!(
            builder.add_node(site, NodeKind::Device, cu(0.5)),
            Err(TopologyError::ServerNotCreated)
        );
        builder.add_node(site, NodeKind::Server, cu(1.0)).unwrap();
        assert_eq!(
            builder.add_node(site, NodeKind::Server, cu(1.0)),
            Err(TopologyError::DuplicateServer)
        );
        builder.add_node(site, NodeKind::Device, cu(0.5)).unwrap();
    }

    #[test]
    fn leaves_cannot_have_children() {
        let mut builder = TopologyBuilder::new();
        let root = builder.create_root(cu(4.0)).unwrap();
        let server = builder.add_node(root, NodeKind::Server, cu(1.0)).unwrap();
        assert_eq!(
            builder.add_node(server, NodeKind::Device, cu(0.5)),
            Err(TopologyError::InvalidParent {
                parent: NodeKind::Server,
                child: NodeKind::Device,
            })
        );
    }

    #[test]
    fn devices_get_contiguous_client_ids() {
        let mut builder = TopologyBuilder::new();
        let root = builder.create_root(cu(4.0)).unwrap();
        builder.add_node(root, NodeKind::Server, cu(1.0)).unwrap();
        let site = builder
            .add_named_node(
                root,
                "edge",
                NodeKind::Site {
                    tier: SiteTier::Edge,
                },
                cu(2.0),
            )
            .unwrap();
        for _ in 0..3 {
            builder.add_node(site, NodeKind::Device, cu(0.5)).unwrap();
        }
        let topology = builder.finalize().unwrap();
        let ids: Vec<_> = topology.client_ids().collect();
        assert_eq!(ids, vec![ClientId(0), ClientId(1), ClientId(2)]);
        assert_eq!(topology.node(topology.devices()[2]).unwrap().name, "device_2");
    }

    #[test]
    fn max_devices() {
        let mut builder = TopologyBuilder::new().with_max_devices(1);
        let root = builder.create_root(cu(4.0)).unwrap();
        builder.add_node(root, NodeKind::Server, cu(1.0)).unwrap();
        builder.add_node(root, NodeKind::Device, cu(0.5)).unwrap();
        assert_eq!(
            builder.add_node(root, NodeKind::Device, cu(0.5)),
            Err(TopologyError::MaxDevicesReached(1))
        );
    }

    #[test]
    fn duplicate_names() {
        let mut builder = TopologyBuilder::new();
        let root = builder.create_root(cu(4.0)).unwrap();
        builder
            .add_named_node(root, "edge", NodeKind::EDGE, cu(1.0))
            .unwrap();
        assert_eq!(
            builder.add_named_node(root, "edge", NodeKind::EDGE, cu(1.0)),
            Err(TopologyError::DuplicateName("edge".to_owned()))
        );
    }

    #[test]
    fn links_validate_endpoints() {
        let mut builder = TopologyBuilder::new();
        let root = builder.create_root(cu(2.0)).unwrap();
        let a = builder.add_node(root, NodeKind::CLOUD, cu(1.0)).unwrap();
        let b = builder.add_node(root, NodeKind::EDGE, cu(1.0)).unwrap();
        assert_eq!(
            builder.add_link(a, a, LinkParams::new(10.0)),
            Err(TopologyError::SelfLink(a))
        );
        assert_eq!(
            builder.add_link(a, NodeId(9), LinkParams::new(10.0)),
            Err(TopologyError::UnknownNode(NodeId(9)))
        );
        assert!(matches!(
            builder.add_link(a, b, LinkParams::new(10.0).with_loss(150.0)),
            Err(TopologyError::InvalidLink { .. })
        ));
        builder
            .add_link(a, b, LinkParams::new(10.0).with_delay_ms(100).with_loss(1.0))
            .unwrap();
    }

    #[test]
    fn finalize_requires_server_and_clients() {
        let mut builder = TopologyBuilder::new();
        assert_eq!(builder.finalize().unwrap_err(), TopologyError::NoRoot);
        let root = builder.create_root(cu(2.0)).unwrap();
        assert_eq!(builder.finalize().unwrap_err(), TopologyError::NoServer);
        builder.add_node(root, NodeKind::Server, cu(1.0)).unwrap();
        assert_eq!(builder.finalize().unwrap_err(), TopologyError::NoClients);
        builder.add_node(root, NodeKind::Device, cu(1.0)).unwrap();
        builder.finalize().unwrap();
    }

    #[test]
    fn frozen_after_finalize() {
        let mut builder = TopologyBuilder::new();
        let root = builder.create_root(cu(2.0)).unwrap();
        builder.add_node(root, NodeKind::Server, cu(1.0)).unwrap();
        let device = builder.add_node(root, NodeKind::Device, cu(0.5)).unwrap();
        builder.finalize().unwrap();
        assert_eq!(
            builder.add_node(root, NodeKind::Device, cu(0.1)),
            Err(TopologyError::Frozen)
        );
        assert_eq!(
            builder.add_link(root, device, LinkParams::new(1.0)),
            Err(TopologyError::Frozen)
        );
        assert_eq!(builder.finalize().unwrap_err(), TopologyError::Frozen);
    }
}
