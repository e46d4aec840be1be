use crate::outcome::Outcome;
use crate::run::Run;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Measurement that run records are stored in.
pub const RUN_RECORD_MEASUREMENT: &str = "hangar.run_record";

/// An immutable fact about one scenario execution, as stored in the metrics store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    /// The run this execution belonged to
    pub run_id: String,
    /// The branch the run was built from
    pub branch: String,
    /// The name of the scenario that was executed
    pub scenario: String,
    /// How the execution ended
    pub outcome: Outcome,
    /// Wall clock duration of the execution, in seconds
    pub duration_s: f64,
    /// The number of scenarios the run was dispatched with
    ///
    /// Declared by the execution unit, so it may be missing for records derived from local
    /// container inspection of an older run.
    pub total_scenarios: Option<u64>,
    /// When the record was produced, as a Unix timestamp in seconds
    pub timestamp: i64,
}

impl RunRecord {
    pub fn new(
        run: &Run,
        scenario: impl Into<String>,
        outcome: Outcome,
        duration: Duration,
    ) -> Self {
        Self {
            run_id: run.run_id.clone(),
            branch: run.branch.clone(),
            scenario: scenario.into(),
            outcome,
            duration_s: duration.as_secs_f64(),
            total_scenarios: None,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn with_total_scenarios(mut self, total_scenarios: u64) -> Self {
        self.total_scenarios = Some(total_scenarios);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// One attempt to run one scenario within one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioExecution {
    pub scenario: String,
    /// Container id for local runs, pod name for cluster runs
    pub unit_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Outcome,
}

impl ScenarioExecution {
    pub fn new(scenario: impl Into<String>, unit_id: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            unit_id: unit_id.into(),
            started_at: None,
            finished_at: None,
            outcome: Outcome::Pending,
        }
    }

    /// Time between start and finish, if both are known and in order.
    pub fn duration(&self) -> Option<Duration> {
        let started_at = self.started_at?;
        let finished_at = self.finished_at?;
        (finished_at - started_at).to_std().ok()
    }

    /// Turn a finished execution into a record for the metrics store.
    ///
    /// Executions that are still pending or running have nothing to record yet.
    pub fn to_record(&self, run: &Run, total_scenarios: Option<u64>) -> Option<RunRecord> {
        if !self.outcome.is_terminal() {
            return None;
        }

        let mut record = RunRecord::new(
            run,
            self.scenario.clone(),
            self.outcome,
            self.duration().unwrap_or_default(),
        );
        if let Some(finished_at) = self.finished_at {
            record = record.with_timestamp(finished_at.timestamp());
        }
        record.total_scenarios = total_scenarios;

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn finished(outcome: Outcome) -> ScenarioExecution {
        let mut execution = ScenarioExecution::new("wallet_test", "4f2a9c");
        execution.started_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        execution.finished_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 42).unwrap());
        execution.outcome = outcome;
        execution
    }

    #[test]
    fn duration_from_start_and_finish() {
        assert_eq!(Some(Duration::from_secs(42)), finished(Outcome::Failure).duration());
        assert_eq!(None, ScenarioExecution::new("a", "b").duration());
    }

    #[test]
    fn finished_execution_becomes_a_record() {
        let run = Run::new("abc123", "main");
        let record = finished(Outcome::Failure).to_record(&run, Some(3)).unwrap();

        assert_eq!("abc123", record.run_id);
        assert_eq!("main", record.branch);
        assert_eq!(Outcome::Failure, record.outcome);
        assert_eq!(42.0, record.duration_s);
        assert_eq!(Some(3), record.total_scenarios);
        assert_eq!(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 42).unwrap().timestamp(),
            record.timestamp
        );
    }

    #[test]
    fn unfinished_execution_has_no_record() {
        let run = Run::new("abc123", "main");
        let mut execution = finished(Outcome::Running);
        execution.finished_at = None;

        assert!(execution.to_record(&run, None).is_none());
    }

    #[test]
    fn unknown_outcome_is_still_recorded() {
        let run = Run::new("abc123", "main");
        let record = finished(Outcome::Unknown).to_record(&run, None).unwrap();

        assert_eq!(Outcome::Unknown, record.outcome);
    }
}
