use crate::{NodeId, NodeKind, ResourceBudget};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("no root node, call create_root first")]
    NoRoot,

    #[error("the topology already has a root node")]
    RootExists,

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("no node named {0:?}")]
    UnknownName(String),

    #[error("a node named {0:?} already exists")]
    DuplicateName(String),

    #[error("a {child} node cannot be placed under a {parent} node")]
    InvalidParent { parent: NodeKind, child: NodeKind },

    #[error("the topology already has a server")]
    DuplicateServer,

    #[error("the server must be created before any device")]
    ServerNotCreated,

    #[error("the maximum number of devices ({0}) has been reached")]
    MaxDevicesReached(usize),

    #[error(
        "requested {requested} under node {parent}, but only {remaining} of its {capacity} remains"
    )]
    ResourceExceeded {
        parent: NodeId,
        requested: ResourceBudget,
        remaining: ResourceBudget,
        capacity: ResourceBudget,
    },

    #[error("invalid budget {0}: units must be finite and non-negative")]
    InvalidBudget(ResourceBudget),

    #[error("cannot link node {0} to itself")]
    SelfLink(NodeId),

    #[error("invalid link between {a} and {b}: {reason}")]
    InvalidLink { a: NodeId, b: NodeId, reason: String },

    #[error("node {0:?} needs either a budget or a host profile")]
    MissingBudget(String),

    #[error("device group {0:?} must have at least one device")]
    EmptyDeviceGroup(String),

    #[error("the topology has no server node")]
    NoServer,

    #[error("the topology has no device nodes")]
    NoClients,

    #[error("the topology is finalized and can no longer be modified")]
    Frozen,
}
