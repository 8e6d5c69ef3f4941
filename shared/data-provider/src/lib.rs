mod assignment;
mod dataset;
mod error;
mod partition;
mod split;

pub use assignment::PartitionAssignment;
pub use dataset::DatasetDescriptor;
pub use error::PartitionError;
pub use partition::{
    ClassAssignmentMode, DirichletConfig, PartitionStrategy, PathologicalConfig,
    DIRICHLET_MAX_TRIALS,
};
pub use split::ClientPartition;
