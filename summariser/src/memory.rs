use crate::model::{Figure, ScenarioDuration};
use crate::query::RunRecordQueries;
use hangar_run_model::{load_run_records, Outcome, RunRecord};
use itertools::Itertools;
use std::path::Path;

/// Run records held in memory, for reports built from a local run ledger.
///
/// Computes the same figures as the InfluxDB queries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRunRecordStore {
    records: Vec<RunRecord>,
}

impl InMemoryRunRecordStore {
    pub fn new(records: Vec<RunRecord>) -> Self {
        Self { records }
    }

    pub fn from_ledger(path: &Path) -> anyhow::Result<Self> {
        let records = load_run_records(path)?;
        log::debug!("Loaded {} run records from {}", records.len(), path.display());

        Ok(Self::new(records))
    }

    /// Records of the run, oldest first.
    fn run_records(&self, run_id: &str) -> Vec<&RunRecord> {
        self.records
            .iter()
            .filter(|r| r.run_id == run_id)
            .sorted_by_key(|r| r.timestamp)
            .collect()
    }
}

impl RunRecordQueries for InMemoryRunRecordStore {
    async fn duration_stats(&self, run_id: &str) -> anyhow::Result<(Figure<f64>, Figure<f64>)> {
        let durations = self
            .run_records(run_id)
            .iter()
            .map(|r| r.duration_s)
            .collect::<Vec<_>>();
        if durations.is_empty() {
            return Ok((Figure::Unavailable, Figure::Unavailable));
        }

        let n = durations.len() as f64;
        let mean = durations.iter().sum::<f64>() / n;

        // Sample standard deviation, which needs at least two values
        let stddev = (durations.len() > 1).then(|| {
            let variance = durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        });

        Ok((Figure::Value(mean), stddev.into()))
    }

    async fn longest(&self, run_id: &str) -> anyhow::Result<Figure<ScenarioDuration>> {
        Ok(self
            .run_records(run_id)
            .into_iter()
            .reduce(|longest, r| if r.duration_s > longest.duration_s { r } else { longest })
            .map(|r| ScenarioDuration::new(&r.scenario, r.duration_s))
            .into())
    }

    async fn shortest(&self, run_id: &str) -> anyhow::Result<Figure<ScenarioDuration>> {
        Ok(self
            .run_records(run_id)
            .into_iter()
            .reduce(|shortest, r| if r.duration_s < shortest.duration_s { r } else { shortest })
            .map(|r| ScenarioDuration::new(&r.scenario, r.duration_s))
            .into())
    }

    async fn total_scenarios(&self, run_id: &str) -> anyhow::Result<Figure<u64>> {
        Ok(self
            .run_records(run_id)
            .into_iter()
            .find_map(|r| r.total_scenarios)
            .into())
    }

    async fn succeeded(&self, run_id: &str) -> anyhow::Result<Figure<u64>> {
        let records = self.run_records(run_id);
        if records.is_empty() {
            return Ok(Figure::Unavailable);
        }

        let count = records
            .iter()
            .filter(|r| r.outcome == Outcome::Success)
            .map(|r| r.scenario.as_str())
            .unique()
            .count();

        Ok(Figure::Value(count as u64))
    }

    async fn failures(&self, run_id: &str) -> anyhow::Result<Figure<Vec<ScenarioDuration>>> {
        let records = self.run_records(run_id);
        if records.is_empty() {
            return Ok(Figure::Unavailable);
        }

        Ok(Figure::Value(
            records
                .iter()
                .filter(|r| r.outcome == Outcome::Failure)
                .map(|r| ScenarioDuration::new(&r.scenario, r.duration_s))
                .collect(),
        ))
    }
}
