use netfl_core::ClientId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("invalid partition config: {0}")]
    InvalidConfig(String),

    #[error("client {client_id} is out of range, only {num_partitions} partitions exist")]
    ClientOutOfRange {
        client_id: ClientId,
        num_partitions: usize,
    },

    #[error(
        "could not give every partition at least {min_partition_size} examples after {trials} trials"
    )]
    MinPartitionSizeNotReached {
        min_partition_size: usize,
        trials: usize,
    },
}
