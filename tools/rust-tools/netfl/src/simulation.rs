use crate::dataset::Samples;
use anyhow::Result;
use netfl_coordinator::{Evaluation, Hyperparameters, Parameters, TrainOutput, TrainingPrimitive};
use std::{sync::Arc, time::Duration};

// keeps a zero-budget device from stalling forever
const MIN_COMPUTE_UNITS: f64 = 0.01;

/// Nearest-centroid classifier: one layer per class holding that class's centroid.
/// Training pulls each centroid towards the mean of the shard's examples of that
/// class; the time it takes is scaled by the device's compute units.
pub struct NearestCentroid {
    samples: Arc<Samples>,
    num_classes: usize,
    work_per_example: Duration,
}

impl NearestCentroid {
    pub fn new(
        samples: Arc<Samples>,
        num_classes: u32,
        work_ms_per_example: f64,
        compute_units: f64,
    ) -> Self {
        let scaled = work_ms_per_example / compute_units.max(MIN_COMPUTE_UNITS);
        Self {
            samples,
            num_classes: num_classes as usize,
            work_per_example: Duration::from_secs_f64(scaled / 1000.0),
        }
    }

    pub fn initial_parameters(num_classes: u32, num_features: usize) -> Parameters {
        Parameters::zeros(&vec![num_features; num_classes as usize])
    }

    fn class_means(&self, shard: &[usize]) -> Vec<Option<Vec<f32>>> {
        let mut sums: Vec<Option<(Vec<f32>, usize)>> = vec![None; self.num_classes];
        for index in shard {
            let (Some(features), Some(label)) =
                (self.samples.features.get(*index), self.samples.labels.get(*index))
            else {
                continue;
            };
            let Some(slot) = sums.get_mut(*label as usize) else {
                continue;
            };
            let (sum, count) = slot.get_or_insert_with(|| (vec![0.0; features.len()], 0));
            sum.iter_mut().zip(features).for_each(|(s, f)| *s += f);
            *count += 1;
        }
        sums.into_iter()
            .map(|s| s.map(|(sum, count)| sum.into_iter().map(|v| v / count as f32).collect()))
            .collect()
    }

    fn simulate_work(&self, shard_len: usize, batch_size: usize) {
        if self.work_per_example.is_zero() {
            return;
        }
        let batch_size = batch_size.max(1);
        let mut remaining = shard_len;
        while remaining > 0 {
            let batch = remaining.min(batch_size);
            std::thread::sleep(self.work_per_example * batch as u32);
            remaining -= batch;
        }
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl TrainingPrimitive for NearestCentroid {
    fn fit(
        &mut self,
        mut parameters: Parameters,
        shard: &[usize],
        hyperparameters: &Hyperparameters,
    ) -> Result<TrainOutput> {
        let means = self.class_means(shard);
        let rate = hyperparameters.learning_rate.clamp(0.0, 1.0) as f32;
        for _ in 0..hyperparameters.epochs {
            self.simulate_work(shard.len(), hyperparameters.batch_size);
            for (centroid, mean) in parameters.layers.iter_mut().zip(&means) {
                if let Some(mean) = mean {
                    centroid
                        .iter_mut()
                        .zip(mean)
                        .for_each(|(c, m)| *c += rate * (m - *c));
                }
            }
        }
        Ok(TrainOutput {
            parameters,
            num_examples: shard.len(),
        })
    }

    fn evaluate(&mut self, parameters: &Parameters, shard: &[usize]) -> Result<Evaluation> {
        let mut loss = 0.0;
        let mut correct = 0;
        let mut seen = 0;
        for index in shard {
            let (Some(features), Some(label)) =
                (self.samples.features.get(*index), self.samples.labels.get(*index))
            else {
                continue;
            };
            let predicted = parameters
                .layers
                .iter()
                .enumerate()
                .map(|(class, centroid)| (class, squared_distance(centroid, features)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(class, _)| class);
            if predicted == Some(*label as usize) {
                correct += 1;
            }
            if let Some(own) = parameters.layers.get(*label as usize) {
                loss += squared_distance(own, features) as f64;
            }
            seen += 1;
        }
        Ok(match seen {
            0 => Evaluation {
                loss: 0.0,
                accuracy: 0.0,
                num_examples: 0,
            },
            n => Evaluation {
                loss: loss / n as f64,
                accuracy: correct as f64 / n as f64,
                num_examples: n,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SyntheticDatasetConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn learns_well_separated_blobs() {
        let config = SyntheticDatasetConfig {
            spread: 0.2,
            ..Default::default()
        };
        let data = config.generate(3).unwrap();
        let train = Arc::new(data.train);
        let mut model = NearestCentroid::new(train.clone(), config.num_classes, 0.0, 1.0);

        let hyperparameters = Hyperparameters {
            batch_size: 32,
            epochs: 20,
            learning_rate: 0.5,
        };
        let shard: Vec<usize> = (0..train.len()).collect();
        let output = model
            .fit(
                NearestCentroid::initial_parameters(config.num_classes, config.num_features),
                &shard,
                &hyperparameters,
            )
            .unwrap();
        assert_eq!(output.num_examples, train.len());

        let mut evaluator = NearestCentroid::new(Arc::new(data.test), config.num_classes, 0.0, 1.0);
        let evaluation = evaluator
            .evaluate(&output.parameters, &(0..config.test_examples).collect::<Vec<_>>())
            .unwrap();
        assert!(evaluation.accuracy > 0.95, "{evaluation:?}");
        assert_eq!(evaluation.num_examples, config.test_examples);
    }

    #[test]
    fn empty_shard() {
        let data = SyntheticDatasetConfig::default().generate(0).unwrap();
        let mut model = NearestCentroid::new(Arc::new(data.test), 4, 0.0, 1.0);
        let evaluation = model
            .evaluate(&NearestCentroid::initial_parameters(4, 2), &[])
            .unwrap();
        assert_eq!(evaluation.num_examples, 0);
    }
}
