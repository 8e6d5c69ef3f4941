use crate::{
    client::run_blocking, Backend, EvaluateInstruction, Evaluation, FitInstruction, FitResponse,
    FlClient, Parameters, TrainingPrimitive,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use netfl_core::ClientId;
use netfl_metrics::{ClientEvaluateMetrics, ResourceProbe, SysinfoProbe};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;

/// Held-out data the server evaluates aggregated parameters against.
pub struct ServerEvaluator<T: TrainingPrimitive> {
    primitive: Arc<std::sync::Mutex<T>>,
    shard: Vec<usize>,
}

impl<T: TrainingPrimitive> ServerEvaluator<T> {
    pub fn new(primitive: T, shard: Vec<usize>) -> Self {
        Self {
            primitive: Arc::new(std::sync::Mutex::new(primitive)),
            shard,
        }
    }

    async fn evaluate(&self, parameters: &Parameters) -> Result<Evaluation> {
        let parameters = parameters.clone();
        let shard = self.shard.clone();
        run_blocking(&self.primitive, move |primitive| {
            primitive.evaluate(&parameters, &shard)
        })
        .await?
    }
}

/// Every client lives in this process. Each fit runs on its own task, so a fit the
/// coordinator stops waiting for still runs to completion and leaves its client
/// ready for the next round.
pub struct LocalBackend<T: TrainingPrimitive, P: ResourceProbe = SysinfoProbe> {
    clients: BTreeMap<ClientId, Arc<Mutex<FlClient<T, P>>>>,
    evaluator: ServerEvaluator<T>,
}

impl<T: TrainingPrimitive, P: ResourceProbe> LocalBackend<T, P> {
    pub fn new(
        clients: impl IntoIterator<Item = FlClient<T, P>>,
        evaluator: ServerEvaluator<T>,
    ) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.client_id(), Arc::new(Mutex::new(c))))
                .collect(),
            evaluator,
        }
    }

    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    fn client(&self, client_id: ClientId) -> Result<&Arc<Mutex<FlClient<T, P>>>> {
        self.clients
            .get(&client_id)
            .ok_or_else(|| anyhow!("no client with id {client_id}"))
    }
}

#[async_trait]
impl<T: TrainingPrimitive, P: ResourceProbe> Backend for LocalBackend<T, P> {
    async fn available_clients(&self) -> Result<Vec<ClientId>> {
        Ok(self.clients.keys().copied().collect())
    }

    async fn fit(&self, client_id: ClientId, instruction: FitInstruction) -> Result<FitResponse> {
        let client = self.client(client_id)?.clone();
        tokio::spawn(async move { client.lock().await.fit(instruction).await })
            .await
            .with_context(|| format!("fit task of client {client_id} crashed"))?
    }

    async fn evaluate_client(
        &self,
        client_id: ClientId,
        instruction: EvaluateInstruction,
    ) -> Result<ClientEvaluateMetrics> {
        self.client(client_id)?
            .lock()
            .await
            .evaluate(instruction)
            .await
    }

    async fn evaluate(&self, _round: u32, parameters: &Parameters) -> Result<Evaluation> {
        self.evaluator.evaluate(parameters).await
    }
}
