use crate::{
    EvaluateInstruction, Evaluation, FitInstruction, FitResponse, TrainOutput, TrainingPrimitive,
};
use anyhow::{anyhow, Context, Result};
use netfl_core::{ClientId, Timestamp};
use netfl_data_provider::ClientPartition;
use netfl_metrics::{
    measure_duration, ClientEvaluateMetrics, ExchangeTimer, FitMetrics, ResourceProbe,
    ResourceSampler, SysinfoProbe,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, info_span, warn, Instrument};

/// Runs `f` against the primitive on the blocking pool. The blocking task holds its
/// own handle to the primitive, so dropping the returned future abandons the result
/// but never the primitive. A panic inside `f` poisons it for good.
pub(crate) async fn run_blocking<T, R, F>(primitive: &Arc<Mutex<T>>, f: F) -> Result<R>
where
    T: TrainingPrimitive,
    R: Send + 'static,
    F: FnOnce(&mut T) -> R + Send + 'static,
{
    let primitive = primitive.clone();
    tokio::task::spawn_blocking(move || -> Result<R> {
        let mut primitive = primitive
            .lock()
            .map_err(|_| anyhow!("training primitive panicked in an earlier call"))?;
        Ok(f(&mut *primitive))
    })
    .await
    .context("training primitive crashed")?
}

/// One federated client: a training primitive bound to its data partition, with
/// every fit instrumented.
pub struct FlClient<T: TrainingPrimitive, P: ResourceProbe = SysinfoProbe> {
    client_id: ClientId,
    partition: Arc<ClientPartition>,
    primitive: Arc<Mutex<T>>,
    sampler: Option<ResourceSampler<P>>,
    exchange: ExchangeTimer,
}

impl<T: TrainingPrimitive, P: ResourceProbe> FlClient<T, P> {
    pub fn new(partition: ClientPartition, primitive: T) -> Self {
        Self {
            client_id: partition.client_id,
            partition: Arc::new(partition),
            primitive: Arc::new(Mutex::new(primitive)),
            sampler: None,
            exchange: ExchangeTimer::new(),
        }
    }

    /// Fits will also report mean CPU and memory usage sampled while training.
    pub fn with_sampler(mut self, sampler: ResourceSampler<P>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn partition(&self) -> &ClientPartition {
        &self.partition
    }

    pub async fn fit(&mut self, instruction: FitInstruction) -> Result<FitResponse> {
        let client_id = self.client_id;
        let round = instruction.round;
        let exchange_time = self.exchange.on_receive(client_id);

        if let Some(sampler) = self.sampler.as_mut() {
            if sampler.is_sampling() {
                // the previous fit was dropped before it could stop sampling
                warn!(client_id = client_id.0, "Discarding samples of an abandoned fit");
                sampler.stop().await?;
            }
            sampler.start()?;
        }

        let partition = self.partition.clone();
        let trained = run_blocking(&self.primitive, move |primitive| {
            measure_duration(|| {
                primitive.fit(
                    instruction.parameters.as_ref().clone(),
                    &partition.train,
                    &instruction.hyperparameters,
                )
            })
        })
        .instrument(info_span!("fit", client_id = client_id.0, round))
        .await;

        let usage = match self.sampler.as_mut() {
            Some(sampler) => Some(sampler.stop().await?),
            None => None,
        };
        let (output, train_time) = trained?;
        let TrainOutput {
            parameters,
            num_examples,
        } = output?;

        self.exchange.record_send(client_id);
        debug!(
            client_id = client_id.0,
            round,
            num_examples,
            train_time,
            exchange_time,
            "Finished local fit"
        );

        Ok(FitResponse {
            parameters,
            num_examples,
            metrics: FitMetrics {
                client_id,
                round,
                dataset_length: num_examples,
                train_time,
                exchange_time,
                cpu_avg: usage.map(|u| u.cpu_percent),
                memory_avg: usage.map(|u| u.memory_bytes),
                timestamp: Timestamp::now(),
            },
        })
    }

    /// Evaluates on this client's test split.
    pub async fn evaluate(&mut self, instruction: EvaluateInstruction) -> Result<ClientEvaluateMetrics> {
        let partition = self.partition.clone();
        let parameters = instruction.parameters.clone();
        let Evaluation {
            loss,
            accuracy,
            num_examples,
        } = run_blocking(&self.primitive, move |primitive| {
            primitive.evaluate(&parameters, &partition.test)
        })
        .await??;

        Ok(ClientEvaluateMetrics {
            client_id: self.client_id,
            round: instruction.round,
            loss,
            accuracy,
            dataset_length: num_examples,
            timestamp: Timestamp::now(),
        })
    }
}
