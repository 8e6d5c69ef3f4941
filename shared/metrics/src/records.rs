use netfl_core::{ClientId, Timestamp};
use serde::{Deserialize, Serialize};

/// What one client reports back after a local fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub client_id: ClientId,
    pub round: u32,
    pub dataset_length: usize,
    /// Seconds spent in the training primitive.
    pub train_time: f64,
    /// Seconds between this client's previous update and this round's parameters
    /// arriving. Absent on a client's first round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_avg: Option<f64>,
    pub timestamp: Timestamp,
}

/// Centralised evaluation of the aggregated parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluateMetrics {
    pub round: u32,
    pub loss: f64,
    pub accuracy: f64,
    pub dataset_length: usize,
    pub timestamp: Timestamp,
}

/// One client's evaluation of the aggregated parameters on its local test split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientEvaluateMetrics {
    pub client_id: ClientId,
    pub round: u32,
    pub loss: f64,
    pub accuracy: f64,
    pub dataset_length: usize,
    pub timestamp: Timestamp,
}
