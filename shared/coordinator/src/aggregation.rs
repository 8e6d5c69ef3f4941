use crate::{AggregationError, Parameters};
use netfl_core::ClientId;
use serde::{Deserialize, Serialize};

/// One client's contribution to a round.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientUpdate {
    pub client_id: ClientId,
    pub parameters: Parameters,
    pub num_examples: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    /// Sample-count weighted mean: `Σ(n_i · p_i) / Σ(n_i)`.
    #[default]
    FedAvg,
}

impl AggregationStrategy {
    /// Every update must have the shape of `global`. Accumulates in f64 and visits
    /// updates in the order given, so callers wanting reproducible floats should
    /// sort by client id first.
    pub fn aggregate(
        &self,
        global: &Parameters,
        updates: &[ClientUpdate],
    ) -> Result<Parameters, AggregationError> {
        match self {
            AggregationStrategy::FedAvg => fed_avg(global, updates),
        }
    }
}

fn fed_avg(global: &Parameters, updates: &[ClientUpdate]) -> Result<Parameters, AggregationError> {
    if updates.is_empty() {
        return Err(AggregationError::NoResults);
    }
    if let Some(bad) = updates.iter().find(|u| !u.parameters.same_shape(global)) {
        return Err(AggregationError::ShapeMismatch(bad.client_id));
    }
    let total: usize = updates.iter().map(|u| u.num_examples).sum();
    if total == 0 {
        return Err(AggregationError::ZeroExamples);
    }

    let mut sums: Vec<Vec<f64>> = global.layers.iter().map(|l| vec![0.0; l.len()]).collect();
    for update in updates {
        let weight = update.num_examples as f64;
        for (sum, layer) in sums.iter_mut().zip(&update.parameters.layers) {
            for (s, v) in sum.iter_mut().zip(layer) {
                *s += weight * *v as f64;
            }
        }
    }
    let total = total as f64;
    Ok(Parameters::new(
        sums.into_iter()
            .map(|layer| layer.into_iter().map(|s| (s / total) as f32).collect())
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(client: u32, value: f32, n: usize) -> ClientUpdate {
        ClientUpdate {
            client_id: ClientId(client),
            parameters: Parameters::new(vec![vec![value], vec![value, -value]]),
            num_examples: n,
        }
    }

    #[test]
    fn weighted_by_sample_count() {
        let global = Parameters::zeros(&[1, 2]);
        let aggregated = AggregationStrategy::FedAvg
            .aggregate(&global, &[update(0, 2.0, 10), update(1, 4.0, 30)])
            .unwrap();
        assert_eq!(aggregated, Parameters::new(vec![vec![3.5], vec![3.5, -3.5]]));
    }

    #[test]
    fn zero_examples() {
        let global = Parameters::zeros(&[1, 2]);
        assert_eq!(
            AggregationStrategy::FedAvg.aggregate(&global, &[update(0, 1.0, 0)]),
            Err(AggregationError::ZeroExamples)
        );
        assert_eq!(
            AggregationStrategy::FedAvg.aggregate(&global, &[]),
            Err(AggregationError::NoResults)
        );
    }

    #[test]
    fn shape_mismatch() {
        let global = Parameters::zeros(&[2]);
        assert_eq!(
            AggregationStrategy::FedAvg.aggregate(&global, &[update(4, 1.0, 1)]),
            Err(AggregationError::ShapeMismatch(ClientId(4)))
        );
    }
}
