use hangar_run_model::{append_run_record, Outcome, Run, RunRecord};
use hangar_summariser::{
    deliver, summarize_run, Figure, InMemoryRunRecordStore, NotificationSink, RunRecordQueries,
    ScenarioDuration,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn record(scenario: &str, outcome: Outcome, duration_s: u64, timestamp: i64) -> RunRecord {
    RunRecord::new(
        &Run::new("abc123", "main"),
        scenario,
        outcome,
        Duration::from_secs(duration_s),
    )
    .with_total_scenarios(3)
    .with_timestamp(timestamp)
}

#[tokio::test]
async fn run_without_records_is_unavailable() {
    let store = InMemoryRunRecordStore::new(vec![record("wallet_test", Outcome::Success, 5, 1)]);

    let report = summarize_run(&store, "other_run").await;

    assert_eq!(Figure::Unavailable, report.mean_duration_s);
    assert_eq!(Figure::Unavailable, report.stddev_duration_s);
    assert_eq!(Figure::Unavailable, report.longest);
    assert_eq!(Figure::Unavailable, report.shortest);
    assert_eq!(Figure::Unavailable, report.total_scenarios);
    assert_eq!(Figure::Unavailable, report.succeeded);
    assert_eq!(Figure::Unavailable, report.failures);
}

#[tokio::test]
async fn only_failures_is_zero_succeeded() {
    let store = InMemoryRunRecordStore::new(vec![
        record("wallet_test", Outcome::Failure, 42, 1),
        record("name_import", Outcome::Failure, 2, 2),
    ]);

    let report = summarize_run(&store, "abc123").await;

    assert_eq!(Figure::Value(0), report.succeeded);
    assert_eq!(Figure::Value(22.0), report.mean_duration_s);
    assert_eq!(
        Figure::Value(ScenarioDuration::new("wallet_test", 42.0)),
        report.longest
    );
    assert_eq!(
        Figure::Value(ScenarioDuration::new("name_import", 2.0)),
        report.shortest
    );
    assert_eq!(Figure::Value(3), report.total_scenarios);
}

#[tokio::test]
async fn failed_scenario_is_listed_in_the_report() {
    let store = InMemoryRunRecordStore::new(vec![
        record("name_import", Outcome::Success, 4, 1),
        record("wallet_test", Outcome::Failure, 42, 2),
        record("name_preorder", Outcome::Success, 8, 3),
    ]);

    let report = summarize_run(&store, "abc123").await;

    assert_eq!(Figure::Value(2), report.succeeded);
    assert_eq!(
        Figure::Value(vec![ScenarioDuration::new("wallet_test", 42.0)]),
        report.failures
    );

    let text = report.render();
    assert!(text.starts_with("Scenario run report for abc123\n"), "{text}");
    assert!(text.contains("Longest scenario: wallet_test (42.00s)\n"), "{text}");
    assert!(
        text.ends_with("Failed scenarios: 1\n1. wallet_test (42.00s)\n"),
        "{text}"
    );
}

#[tokio::test]
async fn no_failures_is_none() {
    let store = InMemoryRunRecordStore::new(vec![record("name_import", Outcome::Success, 4, 1)]);

    let report = summarize_run(&store, "abc123").await;

    assert_eq!(Figure::Value(Vec::new()), report.failures);
    // A single duration has no sample deviation
    assert_eq!(Figure::Unavailable, report.stddev_duration_s);
    assert!(report.render().ends_with("Failed scenarios: none\n"));
}

#[tokio::test]
async fn report_from_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("records.jsonl");

    append_run_record(&record("name_import", Outcome::Success, 4, 1), &ledger).unwrap();
    append_run_record(&record("wallet_test", Outcome::Failure, 42, 2), &ledger).unwrap();

    let store = InMemoryRunRecordStore::from_ledger(&ledger).unwrap();
    let report = summarize_run(&store, "abc123").await;

    assert_eq!(Figure::Value(1), report.succeeded);
    assert_eq!(Figure::Value(23.0), report.mean_duration_s);
}

/// Delegates to an in-memory store, except for the queries that are set to fail.
struct PartlyBrokenStore {
    inner: InMemoryRunRecordStore,
}

impl RunRecordQueries for PartlyBrokenStore {
    async fn duration_stats(&self, _run_id: &str) -> anyhow::Result<(Figure<f64>, Figure<f64>)> {
        anyhow::bail!("connection reset")
    }

    async fn longest(&self, run_id: &str) -> anyhow::Result<Figure<ScenarioDuration>> {
        self.inner.longest(run_id).await
    }

    async fn shortest(&self, run_id: &str) -> anyhow::Result<Figure<ScenarioDuration>> {
        self.inner.shortest(run_id).await
    }

    async fn total_scenarios(&self, run_id: &str) -> anyhow::Result<Figure<u64>> {
        self.inner.total_scenarios(run_id).await
    }

    async fn succeeded(&self, _run_id: &str) -> anyhow::Result<Figure<u64>> {
        anyhow::bail!("query timed out")
    }

    async fn failures(&self, run_id: &str) -> anyhow::Result<Figure<Vec<ScenarioDuration>>> {
        self.inner.failures(run_id).await
    }
}

#[tokio::test]
async fn failed_query_only_affects_its_own_figures() {
    let store = PartlyBrokenStore {
        inner: InMemoryRunRecordStore::new(vec![
            record("name_import", Outcome::Success, 4, 1),
            record("wallet_test", Outcome::Failure, 42, 2),
        ]),
    };

    let report = summarize_run(&store, "abc123").await;

    assert_eq!(Figure::Unavailable, report.mean_duration_s);
    assert_eq!(Figure::Unavailable, report.stddev_duration_s);
    assert_eq!(Figure::Unavailable, report.succeeded);
    assert_eq!(
        Figure::Value(ScenarioDuration::new("wallet_test", 42.0)),
        report.longest
    );
    assert_eq!(Figure::Value(3), report.total_scenarios);
    assert_eq!(
        Figure::Value(vec![ScenarioDuration::new("wallet_test", 42.0)]),
        report.failures
    );
    assert!(report.render().contains("Succeeded: unavailable\n"));
}

#[derive(Default)]
struct RecordingSink {
    fail: bool,
    sent: Mutex<Vec<String>>,
}

impl NotificationSink for RecordingSink {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        self.sent.lock().push(text.to_string());
        if self.fail {
            anyhow::bail!("webhook returned 500");
        }
        Ok(())
    }
}

#[tokio::test]
async fn report_is_sent_once() {
    let sink = RecordingSink::default();

    deliver(&sink, "Scenario run report for abc123\n").await;

    assert_eq!(vec!["Scenario run report for abc123\n".to_string()], *sink.sent.lock());
}

#[tokio::test]
async fn failed_delivery_is_not_retried() {
    let sink = RecordingSink {
        fail: true,
        ..Default::default()
    };

    deliver(&sink, "report").await;

    assert_eq!(1, sink.sent.lock().len());
}
