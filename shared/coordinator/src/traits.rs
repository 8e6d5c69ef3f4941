use crate::{Hyperparameters, Parameters};
use async_trait::async_trait;
use netfl_core::ClientId;
use netfl_metrics::{ClientEvaluateMetrics, FitMetrics};
use std::sync::Arc;

/// What the coordinator broadcasts to each selected client.
#[derive(Clone, Debug)]
pub struct FitInstruction {
    pub round: u32,
    pub parameters: Arc<Parameters>,
    pub hyperparameters: Hyperparameters,
}

#[derive(Clone, Debug)]
pub struct FitResponse {
    pub parameters: Parameters,
    pub num_examples: usize,
    pub metrics: FitMetrics,
}

#[derive(Clone, Debug)]
pub struct EvaluateInstruction {
    pub round: u32,
    pub parameters: Arc<Parameters>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
    pub num_examples: usize,
}

/// Transport between the coordinator and its clients, plus the server-side
/// evaluator. A failed call only drops that client from the round.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn available_clients(&self) -> anyhow::Result<Vec<ClientId>>;

    async fn fit(&self, client_id: ClientId, instruction: FitInstruction)
        -> anyhow::Result<FitResponse>;

    async fn evaluate_client(
        &self,
        client_id: ClientId,
        instruction: EvaluateInstruction,
    ) -> anyhow::Result<ClientEvaluateMetrics>;

    /// Centralised evaluation of the freshly aggregated parameters.
    async fn evaluate(&self, round: u32, parameters: &Parameters) -> anyhow::Result<Evaluation>;
}

pub struct TrainOutput {
    pub parameters: Parameters,
    pub num_examples: usize,
}

/// The model maths. Blocking and possibly slow; callers run it off the async
/// runtime. `shard` holds dataset indices.
pub trait TrainingPrimitive: Send + 'static {
    fn fit(
        &mut self,
        parameters: Parameters,
        shard: &[usize],
        hyperparameters: &Hyperparameters,
    ) -> anyhow::Result<TrainOutput>;

    fn evaluate(&mut self, parameters: &Parameters, shard: &[usize]) -> anyhow::Result<Evaluation>;
}
