use crate::{ClientEvaluateMetrics, EvaluateMetrics, FitMetrics, InstrumentationError};
use netfl_core::RunningAverage;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::File, io::BufWriter, path::Path};
use tracing::info;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    /// Sorted ascending by client id.
    pub train: Vec<FitMetrics>,
    pub evaluate: Option<EvaluateMetrics>,
    /// Sorted ascending by client id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub client_evaluate: Vec<ClientEvaluateMetrics>,
}

/// Every metric an experiment produced, keyed by round number.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub name: String,
    pub rounds: BTreeMap<u32, RoundReport>,
}

impl MetricsReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rounds: BTreeMap::new(),
        }
    }

    /// Adds fit records to their rounds, keeping each round's list ordered by client
    /// id whatever order the records come in.
    pub fn add_fit(&mut self, records: impl IntoIterator<Item = FitMetrics>) {
        for record in records {
            let round = self.rounds.entry(record.round).or_default();
            let at = round
                .train
                .partition_point(|r| r.client_id <= record.client_id);
            round.train.insert(at, record);
        }
    }

    pub fn set_evaluate(&mut self, record: EvaluateMetrics) {
        let round = record.round;
        self.rounds.entry(round).or_default().evaluate = Some(record);
    }

    pub fn add_client_evaluate(&mut self, records: impl IntoIterator<Item = ClientEvaluateMetrics>) {
        for record in records {
            let round = self.rounds.entry(record.round).or_default();
            let at = round
                .client_evaluate
                .partition_point(|r| r.client_id <= record.client_id);
            round.client_evaluate.insert(at, record);
        }
    }

    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }

    pub fn average_train_time(&self) -> f64 {
        self.fit_records().map(|r| r.train_time).collect::<RunningAverage>().mean()
    }

    /// First participations carry no exchange time and are left out.
    pub fn average_exchange_time(&self) -> f64 {
        self.fit_records()
            .filter_map(|r| r.exchange_time)
            .collect::<RunningAverage>()
            .mean()
    }

    pub fn to_json(&self) -> Result<String, InstrumentationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), InstrumentationError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!(path = %path.display(), rounds = self.rounds.len(), "Wrote metrics report");
        Ok(())
    }

    fn fit_records(&self) -> impl Iterator<Item = &FitMetrics> {
        self.rounds.values().flat_map(|r| r.train.iter())
    }
}
