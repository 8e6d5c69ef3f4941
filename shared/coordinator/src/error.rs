use netfl_core::ClientId;
use netfl_metrics::InstrumentationError;
use std::fmt::Display;
use thiserror::Error;

use crate::Phase;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("num_rounds must be at least 1")]
    NoRounds,

    #[error("min_available_clients must be at least 2, got {0}")]
    MinClientsTooSmall(usize),

    #[error("min_available_clients ({min}) must be less than or equal to max_available_clients ({max})")]
    MinAboveMax { min: usize, max: usize },

    #[error("{name} must be within [0, 1], got {value}")]
    InvalidFraction { name: &'static str, value: f64 },

    #[error("test_size must be within [0, 1), got {0}")]
    InvalidTestSize(f64),

    #[error("round_timeout_ms must be positive")]
    ZeroTimeout,

    #[error("num_partitions ({num_partitions}) must cover every client id below max_available_clients ({max})")]
    TooFewPartitions { num_partitions: usize, max: usize },

    #[error("client id {client_id} must be less than max_available_clients ({max})")]
    ClientIdOutOfRange { client_id: ClientId, max: usize },

    #[error("initial parameters are empty")]
    EmptyParameters,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("nothing to aggregate")]
    NoResults,

    #[error("reported sample counts sum to zero")]
    ZeroExamples,

    #[error("update from client {0} does not match the global parameter shape")]
    ShapeMismatch(ClientId),
}

/// Coarse classification of what went wrong, for the caller deciding how to report it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    RuntimeParticipation,
    InstrumentationPrecondition,
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::RuntimeParticipation => write!(f, "runtime participation"),
            ErrorCategory::InstrumentationPrecondition => write!(f, "instrumentation precondition"),
        }
    }
}

/// Errors that end an experiment. A single client failing a fit is not one of these;
/// it is recorded on the round instead.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("invalid train config: {0}")]
    Config(#[from] ConfigError),

    #[error("only {available} clients available, at least {required} required")]
    InsufficientClients { available: usize, required: usize },

    #[error("round {round}: only {responded} clients responded, at least {required} required")]
    InsufficientParticipants {
        round: u32,
        responded: usize,
        required: usize,
    },

    #[error("round {round}: aggregation failed: {source}")]
    Aggregation {
        round: u32,
        #[source]
        source: AggregationError,
    },

    #[error("instrumentation: {0}")]
    Instrumentation(#[from] InstrumentationError),

    #[error("experiment can't start from phase {0}")]
    InvalidPhase(Phase),
}

impl CoordinatorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoordinatorError::Config(_) | CoordinatorError::InvalidPhase(_) => {
                ErrorCategory::Configuration
            }
            CoordinatorError::InsufficientClients { .. }
            | CoordinatorError::InsufficientParticipants { .. }
            | CoordinatorError::Aggregation { .. } => ErrorCategory::RuntimeParticipation,
            CoordinatorError::Instrumentation(_) => ErrorCategory::InstrumentationPrecondition,
        }
    }
}
