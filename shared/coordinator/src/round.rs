use crate::Parameters;
use netfl_core::{ClientId, Timestamp};
use netfl_metrics::{ClientEvaluateMetrics, EvaluateMetrics, FitMetrics};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    Error(String),
    ShapeMismatch,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timed out"),
            FailureReason::Error(err) => write!(f, "{err}"),
            FailureReason::ShapeMismatch => write!(f, "parameter shape mismatch"),
        }
    }
}

/// A client left out of a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFailure {
    pub client_id: ClientId,
    pub reason: FailureReason,
}

/// Wall-clock seconds spent in each part of a round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub fit: f64,
    pub aggregate: f64,
    pub evaluate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub selected: Vec<ClientId>,
    /// Sorted ascending by client id.
    pub fit_metrics: Vec<FitMetrics>,
    /// Sorted ascending by client id.
    pub failures: Vec<ClientFailure>,
    pub parameters: Parameters,
    pub evaluate: Option<EvaluateMetrics>,
    /// Sorted ascending by client id.
    pub client_evaluate: Vec<ClientEvaluateMetrics>,
    pub durations: PhaseDurations,
    pub started: Timestamp,
    pub finished: Timestamp,
}
