use anyhow::Context;
use hangar_core::prelude::{poll_until, DelegatedShutdownListener, PollSettings};
use indicatif::{ProgressBar, ProgressStyle};
use influxdb::{InfluxDbWriteable, Query, Timestamp};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::future::Future;

/// Measurement that progress snapshots are written to.
pub const PROGRESS_MEASUREMENT: &str = "hangar.progress";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProgressError {
    /// Nothing has been dispatched yet, or the units were already cleaned up.
    #[error("No execution units observed for {scope}")]
    NoUnitsObserved { scope: String },
}

/// What a scope currently holds, as seen by the container engine or cluster scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Units in scope, in any state
    pub observed: usize,
    /// Units that have not reached a terminal state
    pub running: usize,
    /// Cluster nodes available to run units, if the scope has any
    pub nodes: Option<usize>,
}

/// A source of [Observation]s for one run.
pub trait ObserveUnits {
    fn observe(&self) -> impl Future<Output = anyhow::Result<Observation>> + Send;
}

/// How far a run has got at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub observed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<usize>,
    pub completed: usize,
    pub in_progress: usize,
    pub remaining: usize,
}

impl ProgressSnapshot {
    /// Units that have not been observed yet are remaining, observed units that are not running
    /// have completed. The three counts always add up to `total`, even while the observation
    /// disagrees with it.
    pub fn compute(
        scope: &str,
        total: usize,
        observation: Observation,
    ) -> Result<Self, ProgressError> {
        if observation.observed == 0 {
            return Err(ProgressError::NoUnitsObserved {
                scope: scope.to_string(),
            });
        }

        let in_progress = observation.running.min(total);
        let completed = observation.observed.min(total).saturating_sub(in_progress);
        let remaining = total - completed - in_progress;

        Ok(Self {
            total,
            observed: observation.observed,
            nodes: observation.nodes,
            completed,
            in_progress,
            remaining,
        })
    }

    /// `count` as a whole percentage of the total, rounding half up.
    pub fn percent(&self, count: usize) -> usize {
        if self.total == 0 {
            return 0;
        }

        (count * 200 + self.total) / (self.total * 2)
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    /// A single InfluxDB line protocol point.
    pub fn to_line_protocol(&self, run_id: &str, timestamp: u128) -> anyhow::Result<String> {
        let mut query = Timestamp::Seconds(timestamp)
            .into_query(PROGRESS_MEASUREMENT)
            .add_tag("run_id", run_id.to_string())
            .add_field("total", self.total as i64)
            .add_field("observed", self.observed as i64)
            .add_field("completed", self.completed as i64)
            .add_field("in_progress", self.in_progress as i64)
            .add_field("remaining", self.remaining as i64)
            .add_field("completed_percent", self.percent(self.completed) as i64);
        if let Some(nodes) = self.nodes {
            query = query.add_field("nodes", nodes as i64);
        }

        Ok(query
            .build()
            .context("Failed to build progress line")?
            .get())
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("Failed to serialize progress snapshot")
    }
}

impl Display for ProgressSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} completed ({}%), {} in progress ({}%), {} remaining ({}%), {} units observed",
            self.completed,
            self.total,
            self.percent(self.completed),
            self.in_progress,
            self.percent(self.in_progress),
            self.remaining,
            self.percent(self.remaining),
            self.observed,
        )?;

        if let Some(nodes) = self.nodes {
            write!(f, " on {} nodes", nodes)?;
        }

        Ok(())
    }
}

/// Takes progress snapshots of one run.
pub struct ProgressTracker {
    scope: String,
    total: usize,
}

impl ProgressTracker {
    /// `total` is the number of scenarios the run was dispatched with.
    pub fn new(scope: impl Into<String>, total: usize) -> Self {
        Self {
            scope: scope.into(),
            total,
        }
    }

    pub async fn snapshot<O: ObserveUnits>(&self, source: &O) -> anyhow::Result<ProgressSnapshot> {
        let observation = source.observe().await?;
        Ok(ProgressSnapshot::compute(&self.scope, self.total, observation)?)
    }

    /// Take a snapshot every poll interval until every scenario has completed, returning the
    /// final snapshot.
    ///
    /// With `show_bar` the snapshots drive a progress bar, otherwise each one is logged.
    pub async fn watch<O: ObserveUnits>(
        &self,
        source: &O,
        settings: PollSettings,
        shutdown: &mut DelegatedShutdownListener,
        show_bar: bool,
    ) -> anyhow::Result<ProgressSnapshot> {
        let bar = if show_bar {
            let bar = ProgressBar::new(self.total as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} completed {msg}",
                )
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let bar_for_check = bar.clone();
        let result = poll_until(
            &format!("every scenario of {} to complete", self.scope),
            settings,
            shutdown,
            move || {
                let bar = bar_for_check.clone();
                async move {
                    let snapshot = self.snapshot(source).await?;
                    if bar.is_hidden() {
                        log::info!("{}", snapshot);
                    } else {
                        bar.set_position(snapshot.completed as u64);
                        bar.set_message(format!(
                            "{} in progress, {} remaining",
                            snapshot.in_progress, snapshot.remaining
                        ));
                    }

                    Ok(snapshot.is_complete().then_some(snapshot))
                }
            },
        )
        .await;

        bar.finish_and_clear();
        result
    }
}
