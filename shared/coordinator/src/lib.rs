mod aggregation;
mod client;
mod config;
mod coordinator;
mod error;
mod local;
mod parameters;
mod round;
mod selection;
mod state;
mod traits;

pub use aggregation::{AggregationStrategy, ClientUpdate};
pub use client::FlClient;
pub use config::{Hyperparameters, TrainConfig, DEFAULT_ROUND_TIMEOUT_MS};
pub use coordinator::{RoundCoordinator, MIN_EVALUATE_CLIENTS};
pub use error::{AggregationError, ConfigError, CoordinatorError, ErrorCategory};
pub use local::{LocalBackend, ServerEvaluator};
pub use parameters::Parameters;
pub use round::{ClientFailure, FailureReason, PhaseDurations, RoundRecord};
pub use selection::{select_clients, SelectionPurpose};
pub use state::{ExperimentState, Phase};
pub use traits::{
    Backend, EvaluateInstruction, Evaluation, FitInstruction, FitResponse, TrainOutput,
    TrainingPrimitive,
};
