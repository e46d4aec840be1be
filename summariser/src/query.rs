use crate::frame::{load_rows, row_f64, row_str, row_u64, Row};
use crate::model::{Figure, ScenarioDuration};
use anyhow::Context;
use hangar_run_model::{Outcome, RUN_RECORD_MEASUREMENT};
use influxdb::ReadQuery;
use std::future::Future;

/// The aggregate queries a run report is built from, each scoped to one run.
///
/// Every query returns [Figure::Unavailable] when there are no records to compute it from.
pub trait RunRecordQueries {
    /// Mean and sample standard deviation of the durations.
    fn duration_stats(
        &self,
        run_id: &str,
    ) -> impl Future<Output = anyhow::Result<(Figure<f64>, Figure<f64>)>> + Send;

    fn longest(&self, run_id: &str)
        -> impl Future<Output = anyhow::Result<Figure<ScenarioDuration>>> + Send;

    fn shortest(&self, run_id: &str)
        -> impl Future<Output = anyhow::Result<Figure<ScenarioDuration>>> + Send;

    /// The scenario count declared by the first record that has one.
    fn total_scenarios(
        &self,
        run_id: &str,
    ) -> impl Future<Output = anyhow::Result<Figure<u64>>> + Send;

    /// Distinct scenarios with a successful record. `0` when the run has records but none
    /// succeeded.
    fn succeeded(&self, run_id: &str) -> impl Future<Output = anyhow::Result<Figure<u64>>> + Send;

    /// Every failed record. Empty when the run has records but none failed.
    fn failures(
        &self,
        run_id: &str,
    ) -> impl Future<Output = anyhow::Result<Figure<Vec<ScenarioDuration>>>> + Send;
}

/// Run records stored in InfluxDB, queried with InfluxQL.
#[derive(Debug, Clone)]
pub struct InfluxRunRecordStore {
    client: influxdb::Client,
}

impl InfluxRunRecordStore {
    pub fn new(client: influxdb::Client) -> Self {
        Self { client }
    }

    async fn query(
        &self,
        select: &str,
        run_id: &str,
        group_by: Option<&str>,
    ) -> anyhow::Result<Vec<Row>> {
        let q = ReadQuery::new(run_query(select, run_id, group_by));
        log::debug!("Querying: {:?}", q);

        let res = self
            .client
            .json_query(q)
            .await
            .context("Run record query failed")?;
        let rows = load_rows(&res.results)?;
        log::trace!("Loaded rows: {:?}", rows);

        Ok(rows)
    }
}

impl RunRecordQueries for InfluxRunRecordStore {
    async fn duration_stats(&self, run_id: &str) -> anyhow::Result<(Figure<f64>, Figure<f64>)> {
        let rows = self
            .query(
                r#"MEAN("duration") AS "mean", STDDEV("duration") AS "stddev""#,
                run_id,
                None,
            )
            .await?;

        Ok(duration_stats_from(&rows))
    }

    async fn longest(&self, run_id: &str) -> anyhow::Result<Figure<ScenarioDuration>> {
        let rows = self
            .query(r#"MAX("duration") AS "duration", "scenario_name""#, run_id, None)
            .await?;

        Ok(scenario_duration_from(&rows))
    }

    async fn shortest(&self, run_id: &str) -> anyhow::Result<Figure<ScenarioDuration>> {
        let rows = self
            .query(r#"MIN("duration") AS "duration", "scenario_name""#, run_id, None)
            .await?;

        Ok(scenario_duration_from(&rows))
    }

    async fn total_scenarios(&self, run_id: &str) -> anyhow::Result<Figure<u64>> {
        let rows = self
            .query(r#"FIRST("total_scenarios") AS "total""#, run_id, None)
            .await?;

        Ok(total_scenarios_from(&rows))
    }

    async fn succeeded(&self, run_id: &str) -> anyhow::Result<Figure<u64>> {
        let rows = self
            .query(
                r#"COUNT(DISTINCT("scenario_name")) AS "count""#,
                run_id,
                Some("outcome"),
            )
            .await?;

        Ok(succeeded_from(&rows))
    }

    async fn failures(&self, run_id: &str) -> anyhow::Result<Figure<Vec<ScenarioDuration>>> {
        let rows = self
            .query(r#""duration", "scenario_name""#, run_id, Some("outcome"))
            .await?;

        Ok(failures_from(&rows))
    }
}

fn duration_stats_from(rows: &[Row]) -> (Figure<f64>, Figure<f64>) {
    let row = rows.first();
    (
        row.and_then(|r| row_f64(r, "mean")).into(),
        row.and_then(|r| row_f64(r, "stddev")).into(),
    )
}

fn scenario_duration_from(rows: &[Row]) -> Figure<ScenarioDuration> {
    rows.first().and_then(scenario_duration).into()
}

fn total_scenarios_from(rows: &[Row]) -> Figure<u64> {
    rows.first().and_then(|r| row_u64(r, "total")).into()
}

/// Rows are grouped by outcome. A run with records but no successful ones has only other groups,
/// which counts as zero rather than unavailable.
fn succeeded_from(rows: &[Row]) -> Figure<u64> {
    if rows.is_empty() {
        return Figure::Unavailable;
    }

    Figure::Value(
        rows.iter()
            .filter(|r| row_str(r, "outcome") == Some(Outcome::Success.as_str()))
            .filter_map(|r| row_u64(r, "count"))
            .sum(),
    )
}

fn failures_from(rows: &[Row]) -> Figure<Vec<ScenarioDuration>> {
    if rows.is_empty() {
        return Figure::Unavailable;
    }

    Figure::Value(
        rows.iter()
            .filter(|r| row_str(r, "outcome") == Some(Outcome::Failure.as_str()))
            .filter_map(scenario_duration)
            .collect(),
    )
}

fn scenario_duration(row: &Row) -> Option<ScenarioDuration> {
    Some(ScenarioDuration::new(
        row_str(row, "scenario_name")?,
        row_f64(row, "duration")?,
    ))
}

fn run_query(select: &str, run_id: &str, group_by: Option<&str>) -> String {
    let mut q = format!(
        r#"SELECT {} FROM "{}" WHERE "run_id" = '{}'"#,
        select,
        RUN_RECORD_MEASUREMENT,
        escape_literal(run_id)
    );
    if let Some(tag) = group_by {
        q.push_str(&format!(r#" GROUP BY "{}""#, tag));
    }
    q
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', r"\\").replace('\'', r"\'")
}
