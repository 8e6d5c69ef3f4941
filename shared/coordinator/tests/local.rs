use anyhow::{bail, Result};
use netfl_coordinator::{
    ClientFailure, Evaluation, FailureReason, FitInstruction, FlClient, Hyperparameters,
    LocalBackend, Parameters, Phase, RoundCoordinator, ServerEvaluator, TrainConfig, TrainOutput,
    TrainingPrimitive,
};
use netfl_core::ClientId;
use netfl_data_provider::{ClientPartition, DatasetDescriptor, PartitionStrategy};
use netfl_metrics::{ResourceProbe, ResourceSampler, ResourceUsage};
use pretty_assertions::assert_eq;
use std::{sync::Arc, time::Duration};

/// Moves every value to the mean of the shard's indices.
#[derive(Default)]
struct MeanOfShard {
    first_fit_delay: Option<Duration>,
}

impl MeanOfShard {
    fn slow_first_fit(delay: Duration) -> Self {
        Self {
            first_fit_delay: Some(delay),
        }
    }
}

impl TrainingPrimitive for MeanOfShard {
    fn fit(
        &mut self,
        parameters: Parameters,
        shard: &[usize],
        _hyperparameters: &Hyperparameters,
    ) -> Result<TrainOutput> {
        if shard.is_empty() {
            bail!("empty shard");
        }
        std::thread::sleep(self.first_fit_delay.take().unwrap_or(Duration::from_millis(5)));
        let mean = shard.iter().sum::<usize>() as f32 / shard.len() as f32;
        Ok(TrainOutput {
            parameters: Parameters::new(
                parameters.layers.iter().map(|l| vec![mean; l.len()]).collect(),
            ),
            num_examples: shard.len(),
        })
    }

    fn evaluate(&mut self, parameters: &Parameters, shard: &[usize]) -> Result<Evaluation> {
        Ok(Evaluation {
            loss: parameters.layers[0][0] as f64,
            accuracy: 1.0,
            num_examples: shard.len(),
        })
    }
}

struct Constant;

impl ResourceProbe for Constant {
    fn sample(&mut self) -> Option<ResourceUsage> {
        Some(ResourceUsage {
            cpu_percent: 25.0,
            memory_bytes: 2048.0,
        })
    }
}

fn client(id: u32, num_clients: u32, primitive: MeanOfShard) -> FlClient<MeanOfShard, Constant> {
    let dataset = DatasetDescriptor::unlabelled(40);
    let assignment = PartitionStrategy::Iid
        .assign(&dataset, num_clients as usize, 1)
        .unwrap();
    let partition = ClientPartition::split(&assignment, ClientId(id), 0.25, 1, true).unwrap();
    FlClient::new(partition, primitive)
        .with_sampler(ResourceSampler::new(Constant, Duration::from_millis(1)))
}

fn backend_with(
    num_clients: u32,
    primitive: impl Fn(u32) -> MeanOfShard,
) -> Arc<LocalBackend<MeanOfShard, Constant>> {
    let clients = (0..num_clients).map(|id| client(id, num_clients, primitive(id)));
    Arc::new(LocalBackend::new(
        clients,
        ServerEvaluator::new(MeanOfShard::default(), (0..10).collect()),
    ))
}

fn backend(num_clients: u32) -> Arc<LocalBackend<MeanOfShard, Constant>> {
    backend_with(num_clients, |_| MeanOfShard::default())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn local_clients_are_instrumented() {
    let mut config = TrainConfig::new(2, 2, 4);
    config.fraction_evaluate = 1.0;
    let mut coordinator =
        RoundCoordinator::new("local", config, backend(4), Parameters::zeros(&[3])).unwrap();

    let history = coordinator.run().await.unwrap();
    assert_eq!(history.len(), 2);

    for metrics in &history[0].fit_metrics {
        assert_eq!(metrics.exchange_time, None);
        assert_eq!(metrics.cpu_avg, Some(25.0));
        assert_eq!(metrics.memory_avg, Some(2048.0));
        assert!(metrics.train_time > 0.0);
        // 10 examples each, a quarter held out
        assert_eq!(metrics.dataset_length, 7);
    }
    assert!(history[1]
        .fit_metrics
        .iter()
        .all(|m| m.exchange_time.is_some_and(|t| t >= 0.0)));

    let evaluate = history[0].evaluate.as_ref().unwrap();
    assert_eq!(evaluate.dataset_length, 10);
    assert_eq!(history[0].client_evaluate.len(), 4);
    assert!(history[0].client_evaluate.iter().all(|m| m.dataset_length == 3));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn late_client_rejoins_next_round() {
    let backend = backend_with(4, |id| match id {
        3 => MeanOfShard::slow_first_fit(Duration::from_millis(250)),
        _ => MeanOfShard::default(),
    });
    let mut config = TrainConfig::new(3, 2, 4);
    config.round_timeout_ms = 200;
    let mut coordinator =
        RoundCoordinator::new("late", config, backend, Parameters::zeros(&[3])).unwrap();

    let history = coordinator.run().await.unwrap().to_vec();
    assert_eq!(coordinator.phase(), Phase::Finished);
    assert_eq!(history.len(), 3);
    assert_eq!(
        history[0].failures,
        vec![ClientFailure {
            client_id: ClientId(3),
            reason: FailureReason::Timeout,
        }]
    );
    for record in &history[1..] {
        assert_eq!(record.failures, vec![], "round {}", record.round);
        assert_eq!(record.fit_metrics.len(), 4, "round {}", record.round);
        assert!(record.fit_metrics.iter().all(|m| m.cpu_avg == Some(25.0)));
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn client_survives_an_abandoned_fit() {
    let mut fl_client = client(0, 1, MeanOfShard::slow_first_fit(Duration::from_millis(200)));
    let instruction = |round| FitInstruction {
        round,
        parameters: Arc::new(Parameters::zeros(&[2])),
        hyperparameters: Hyperparameters::default(),
    };

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), fl_client.fit(instruction(1))).await;
    assert!(abandoned.is_err());

    let response = fl_client.fit(instruction(2)).await.unwrap();
    assert_eq!(response.metrics.round, 2);
    assert_eq!(response.metrics.cpu_avg, Some(25.0));
    assert_eq!(response.num_examples, 30);
}
