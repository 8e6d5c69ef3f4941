use crate::{
    selection::{select_clients, SelectionPurpose},
    Backend, ClientFailure, ClientUpdate, ConfigError, CoordinatorError, EvaluateInstruction,
    ExperimentState, FailureReason, FitInstruction, Parameters, Phase, PhaseDurations,
    RoundRecord, TrainConfig,
};
use futures::{stream::FuturesUnordered, StreamExt};
use netfl_core::{ClientId, Timestamp};
use netfl_metrics::{
    measure_duration, measure_duration_async, ClientEvaluateMetrics, EvaluateMetrics,
    FitMetrics, InstrumentationError, MetricsReport,
};
use std::{collections::BTreeSet, sync::Arc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Clients asked to evaluate, when federated evaluation is on, never drops below this
/// (or the population, if smaller).
pub const MIN_EVALUATE_CLIENTS: usize = 2;

struct FitRound {
    updates: Vec<ClientUpdate>,
    metrics: Vec<FitMetrics>,
    failures: Vec<ClientFailure>,
}

/// Drives an experiment through its rounds: select, broadcast, wait for quorum or
/// timeout, aggregate, evaluate. Owns the experiment state and round history.
pub struct RoundCoordinator<B: Backend> {
    config: TrainConfig,
    backend: Arc<B>,
    parameters: Arc<Parameters>,
    state: ExperimentState,
    history: Vec<RoundRecord>,
    report: MetricsReport,
}

impl<B: Backend> RoundCoordinator<B> {
    pub fn new(
        name: impl Into<String>,
        config: TrainConfig,
        backend: Arc<B>,
        initial_parameters: Parameters,
    ) -> Result<Self, CoordinatorError> {
        config.validate()?;
        if initial_parameters.is_empty() {
            return Err(ConfigError::EmptyParameters.into());
        }
        Ok(Self {
            config,
            backend,
            parameters: Arc::new(initial_parameters),
            state: ExperimentState::default(),
            history: Vec::new(),
            report: MetricsReport::new(name),
        })
    }

    pub fn state(&self) -> &ExperimentState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn report(&self) -> &MetricsReport {
        &self.report
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Runs every round. Any error is fatal: the phase ends up `Failed`, the reason
    /// is kept in the state and the failing round is not added to the history.
    pub async fn run(&mut self) -> Result<&[RoundRecord], CoordinatorError> {
        if self.state.phase != Phase::Idle {
            return Err(CoordinatorError::InvalidPhase(self.state.phase));
        }
        match self.run_rounds().await {
            Ok(()) => {
                self.change_state(Phase::Finished);
                info!(
                    rounds = self.history.len(),
                    average_train_time = self.report.average_train_time(),
                    average_exchange_time = self.report.average_exchange_time(),
                    "Experiment finished"
                );
                Ok(&self.history)
            }
            Err(err) => {
                error!(
                    round = self.state.current_round,
                    category = %err.category(),
                    "Experiment failed: {err}"
                );
                self.state.stop_reason = Some(err.to_string());
                self.change_state(Phase::Failed);
                Err(err)
            }
        }
    }

    async fn run_rounds(&mut self) -> Result<(), CoordinatorError> {
        self.change_state(Phase::Initializing);
        info!(
            num_rounds = self.config.num_rounds,
            min_available_clients = self.config.min_available_clients,
            max_available_clients = self.config.max_available_clients,
            shape = ?self.parameters.shape(),
            "Initialized global parameters"
        );

        for round in 1..=self.config.num_rounds {
            self.state.current_round = round;
            let record = self
                .run_round(round)
                .instrument(info_span!("round", round))
                .await?;

            self.change_state(Phase::RoundComplete);
            self.report.add_fit(record.fit_metrics.iter().cloned());
            if let Some(evaluate) = &record.evaluate {
                self.report.set_evaluate(evaluate.clone());
            }
            self.report
                .add_client_evaluate(record.client_evaluate.iter().cloned());
            info!(
                round,
                responded = record.fit_metrics.len(),
                dropped = record.failures.len(),
                loss = record.evaluate.as_ref().map(|e| e.loss),
                accuracy = record.evaluate.as_ref().map(|e| e.accuracy),
                "Round complete"
            );
            self.history.push(record);
        }
        Ok(())
    }

    async fn run_round(&mut self, round: u32) -> Result<RoundRecord, CoordinatorError> {
        let started = Timestamp::now();

        self.change_state(Phase::SelectingClients);
        let available = self.available_clients().await;
        if available.len() < self.config.min_available_clients {
            return Err(CoordinatorError::InsufficientClients {
                available: available.len(),
                required: self.config.min_available_clients,
            });
        }
        let selected = select_clients(
            &available,
            self.config.fraction_fit,
            self.config.min_available_clients,
            self.config.seed,
            round,
            SelectionPurpose::Fit,
        );
        info!(
            available = available.len(),
            selected = selected.len(),
            "Selected clients for fit"
        );

        let (fit, fit_time) = measure_duration_async(self.fit_round(round, &selected)).await;
        let FitRound {
            updates,
            metrics: fit_metrics,
            failures,
        } = fit?;
        if updates.len() < self.config.min_available_clients {
            return Err(CoordinatorError::InsufficientParticipants {
                round,
                responded: updates.len(),
                required: self.config.min_available_clients,
            });
        }

        self.change_state(Phase::Aggregating);
        let (aggregated, aggregate_time) = measure_duration(|| {
            self.config
                .aggregation
                .aggregate(&self.parameters, &updates)
        });
        let aggregated =
            aggregated.map_err(|source| CoordinatorError::Aggregation { round, source })?;
        self.parameters = Arc::new(aggregated);

        self.change_state(Phase::Evaluating);
        let ((evaluate, client_evaluate), evaluate_time) =
            measure_duration_async(self.evaluate_round(round, &available)).await;

        Ok(RoundRecord {
            round,
            selected,
            fit_metrics,
            failures,
            parameters: self.parameters.as_ref().clone(),
            evaluate,
            client_evaluate,
            durations: PhaseDurations {
                fit: fit_time,
                aggregate: aggregate_time,
                evaluate: evaluate_time,
            },
            started,
            finished: Timestamp::now(),
        })
    }

    async fn available_clients(&self) -> Vec<ClientId> {
        match self.backend.available_clients().await {
            Ok(clients) => clients
                .into_iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            Err(err) => {
                warn!("Failed to list available clients: {err:#}");
                Vec::new()
            }
        }
    }

    async fn fit_round(
        &mut self,
        round: u32,
        selected: &[ClientId],
    ) -> Result<FitRound, CoordinatorError> {
        self.change_state(Phase::Broadcasting);
        let instruction = FitInstruction {
            round,
            parameters: self.parameters.clone(),
            hyperparameters: self.config.hyperparameters.clone(),
        };
        let mut pending: FuturesUnordered<_> = selected
            .iter()
            .map(|&client_id| {
                let backend = self.backend.clone();
                let instruction = instruction.clone();
                async move { (client_id, backend.fit(client_id, instruction).await) }
            })
            .collect();

        self.change_state(Phase::AwaitingFitResults);
        let deadline = Instant::now() + self.config.round_timeout();
        let mut outstanding: BTreeSet<ClientId> = selected.iter().copied().collect();
        let mut fit = FitRound {
            updates: Vec::new(),
            metrics: Vec::new(),
            failures: Vec::new(),
        };

        loop {
            tokio::select! {
                next = pending.next() => {
                    let Some((client_id, result)) = next else {
                        break;
                    };
                    outstanding.remove(&client_id);
                    match result {
                        Ok(response) if !response.parameters.same_shape(&self.parameters) => {
                            warn!(
                                client_id = client_id.0,
                                expected = ?self.parameters.shape(),
                                got = ?response.parameters.shape(),
                                "Dropping client from round: parameter shape mismatch"
                            );
                            fit.failures.push(ClientFailure {
                                client_id,
                                reason: FailureReason::ShapeMismatch,
                            });
                        }
                        Ok(response) => {
                            debug!(
                                client_id = client_id.0,
                                num_examples = response.num_examples,
                                "Received fit result"
                            );
                            fit.updates.push(ClientUpdate {
                                client_id,
                                parameters: response.parameters,
                                num_examples: response.num_examples,
                            });
                            fit.metrics.push(response.metrics);
                        }
                        Err(err) => {
                            let err = match split_fatal(err) {
                                Ok(fatal) => return Err(fatal),
                                Err(err) => err,
                            };
                            warn!(client_id = client_id.0, "Dropping client from round: {err:#}");
                            fit.failures.push(ClientFailure {
                                client_id,
                                reason: FailureReason::Error(format!("{err:#}")),
                            });
                        }
                    }
                }
                _ = sleep_until(deadline) => {
                    break;
                }
            }
        }
        drop(pending);

        for client_id in outstanding {
            warn!(client_id = client_id.0, "Dropping client from round: timed out");
            fit.failures.push(ClientFailure {
                client_id,
                reason: FailureReason::Timeout,
            });
        }

        fit.updates.sort_by_key(|u| u.client_id);
        fit.metrics.sort_by_key(|m| m.client_id);
        fit.failures.sort_by_key(|f| f.client_id);
        Ok(fit)
    }

    async fn evaluate_round(
        &self,
        round: u32,
        available: &[ClientId],
    ) -> (Option<EvaluateMetrics>, Vec<ClientEvaluateMetrics>) {
        let evaluate = match self.backend.evaluate(round, &self.parameters).await {
            Ok(evaluation) => Some(EvaluateMetrics {
                round,
                loss: evaluation.loss,
                accuracy: evaluation.accuracy,
                dataset_length: evaluation.num_examples,
                timestamp: Timestamp::now(),
            }),
            Err(err) => {
                warn!("Centralised evaluation failed: {err:#}");
                None
            }
        };

        if self.config.fraction_evaluate <= 0.0 {
            return (evaluate, Vec::new());
        }

        let selected = select_clients(
            available,
            self.config.fraction_evaluate,
            MIN_EVALUATE_CLIENTS,
            self.config.seed,
            round,
            SelectionPurpose::Evaluate,
        );
        let instruction = EvaluateInstruction {
            round,
            parameters: self.parameters.clone(),
        };
        let mut pending: FuturesUnordered<_> = selected
            .iter()
            .map(|&client_id| {
                let backend = self.backend.clone();
                let instruction = instruction.clone();
                async move { (client_id, backend.evaluate_client(client_id, instruction).await) }
            })
            .collect();

        let deadline = Instant::now() + self.config.round_timeout();
        let mut client_evaluate = Vec::with_capacity(selected.len());
        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((_, Ok(metrics))) => client_evaluate.push(metrics),
                    Some((client_id, Err(err))) => {
                        warn!(client_id = client_id.0, "Client evaluation failed: {err:#}");
                    }
                    None => break,
                },
                _ = sleep_until(deadline) => {
                    warn!(outstanding = pending.len(), "Client evaluation timed out");
                    break;
                }
            }
        }
        client_evaluate.sort_by_key(|m| m.client_id);
        (evaluate, client_evaluate)
    }

    fn change_state(&mut self, new_phase: Phase) {
        debug_assert_ne!(self.state.phase, new_phase);
        info!(
            round = self.state.current_round,
            from = %self.state.phase,
            to = %new_phase,
            "Phase change"
        );
        self.state.phase = new_phase;
    }
}

/// Sampler misuse inside a client is a bug rather than a flaky client, and ends the
/// experiment. Everything else comes back as `Err` to be recorded as a client failure.
fn split_fatal(err: anyhow::Error) -> Result<CoordinatorError, anyhow::Error> {
    match err.downcast_ref::<InstrumentationError>() {
        Some(InstrumentationError::AlreadySampling | InstrumentationError::NotSampling) => err
            .downcast::<InstrumentationError>()
            .map(CoordinatorError::Instrumentation),
        _ => Err(err),
    }
}
