use crate::report::OutcomeReporter;
use anyhow::Context;
use hangar_core::prelude::DelegatedShutdownListener;
use hangar_run_model::{RunRecord, RUN_RECORD_MEASUREMENT};
use influxdb::{Client, InfluxDbWriteable, Timestamp, WriteQuery};
use tokio::select;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Write run records directly to InfluxDB using the InfluxDB client.
///
/// Records are queued and written by a background task so that reporting never blocks the caller.
/// The task must be running on a Tokio runtime, so create this from within one.
pub struct InfluxClientReporter {
    join_handle: JoinHandle<usize>,
    writer: UnboundedSender<WriteQuery>,
}

impl InfluxClientReporter {
    pub fn new(client: Client, shutdown_listener: DelegatedShutdownListener) -> Self {
        let (join_handle, writer) = start_record_write_task(shutdown_listener, client);

        Self {
            join_handle,
            writer,
        }
    }
}

impl OutcomeReporter for InfluxClientReporter {
    fn report_outcome(&mut self, record: RunRecord) {
        if self.join_handle.is_finished() {
            log::warn!(
                "Dropping record for {} because the write task has finished",
                record.scenario
            );
            return;
        }

        if let Err(e) = self.writer.send(run_record_query(&record)) {
            log::warn!("Failed to queue record for {}: {}", record.scenario, e);
        }
    }

    async fn finalize(self) -> anyhow::Result<()> {
        // Closing the channel lets the write task finish once the queue is drained
        drop(self.writer);

        let failed = self
            .join_handle
            .await
            .context("Run record write task panicked")?;
        if failed > 0 {
            anyhow::bail!("{} run record(s) could not be written to InfluxDB", failed);
        }

        log::debug!("Run records flushed");
        Ok(())
    }
}

/// Build the write for a single run record.
pub fn run_record_query(record: &RunRecord) -> WriteQuery {
    let timestamp = u128::try_from(record.timestamp).unwrap_or_default();

    let mut query = Timestamp::Seconds(timestamp)
        .into_query(RUN_RECORD_MEASUREMENT)
        .add_field("duration", record.duration_s)
        .add_field("scenario_name", record.scenario.clone())
        .add_tag("run_id", record.run_id.clone())
        .add_tag("branch", record.branch.clone())
        .add_tag("scenario", record.scenario.clone())
        .add_tag("outcome", record.outcome.to_string());

    if let Some(total_scenarios) = record.total_scenarios {
        query = query.add_field("total_scenarios", total_scenarios as i64);
    }

    query
}

/// Returns the number of writes that failed.
fn start_record_write_task(
    mut shutdown_listener: DelegatedShutdownListener,
    client: Client,
) -> (JoinHandle<usize>, UnboundedSender<WriteQuery>) {
    let (writer, mut receiver) = tokio::sync::mpsc::unbounded_channel::<WriteQuery>();
    let join_handle = tokio::spawn(async move {
        let mut failed = 0;

        loop {
            select! {
                _ = shutdown_listener.wait_for_shutdown() => {
                    log::debug!("Shutting down run record reporter");
                    break;
                }
                query = receiver.recv() => {
                    match query {
                        Some(query) => {
                            if let Err(e) = client.query(query).await {
                                log::warn!("Failed to send run record to InfluxDB: {}", e);
                                failed += 1;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // Drain anything queued before a shutdown so that finished scenarios are not lost
        let mut drain_count = 0;
        while let Ok(query) = receiver.try_recv() {
            if let Err(e) = client.query(query).await {
                log::warn!("Failed to send run record to InfluxDB: {}", e);
                failed += 1;
            }
            drain_count += 1;
        }
        if drain_count > 0 {
            log::debug!("Drained {} remaining run records", drain_count);
        }

        failed
    });

    (join_handle, writer)
}
