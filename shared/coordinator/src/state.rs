use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Initializing,
    SelectingClients,
    Broadcasting,
    AwaitingFitResults,
    Aggregating,
    Evaluating,
    RoundComplete,
    Finished,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Failed)
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Initializing => write!(f, "Initializing"),
            Phase::SelectingClients => write!(f, "Selecting clients"),
            Phase::Broadcasting => write!(f, "Broadcasting"),
            Phase::AwaitingFitResults => write!(f, "Awaiting fit results"),
            Phase::Aggregating => write!(f, "Aggregating"),
            Phase::Evaluating => write!(f, "Evaluating"),
            Phase::RoundComplete => write!(f, "Round complete"),
            Phase::Finished => write!(f, "Finished"),
            Phase::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentState {
    pub phase: Phase,
    /// 0 until the first round starts.
    pub current_round: u32,
    pub stop_reason: Option<String>,
}
