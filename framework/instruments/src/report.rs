mod in_memory_reporter;
mod influx_client_reporter;

use hangar_run_model::RunRecord;
use std::future::Future;

pub use in_memory_reporter::InMemoryReporter;
pub use influx_client_reporter::{run_record_query, InfluxClientReporter};

/// Somewhere to send the outcome of a scenario execution.
///
/// Execution units call this explicitly when they finish rather than leaving the orchestrator to
/// infer the outcome from their logs.
pub trait OutcomeReporter {
    /// Record the outcome of one scenario execution.
    fn report_outcome(&mut self, record: RunRecord);

    /// Flush everything reported so far. Must be called before the process exits.
    fn finalize(self) -> impl Future<Output = anyhow::Result<()>> + Send
    where
        Self: Sized;
}
