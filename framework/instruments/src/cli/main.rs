//! Called by an execution unit when its scenario finishes, to push its run record to the metrics
//! store.
//!
//! For example: `hangar-report --scenario wallet_test --outcome failure --duration 42`, with the
//! run metadata provided by the environment the orchestrator launched the unit with.

use clap::Parser;
use hangar_core::prelude::ShutdownHandle;
use hangar_instruments::{
    InMemoryReporter, InfluxClientReporter, MetricsConnection, OutcomeReporter, BRANCH_ENV,
    RUN_ID_ENV, TOTAL_SCENARIOS_ENV,
};
use hangar_run_model::{Outcome, Run, RunRecord};
use std::time::Duration;

#[derive(Parser)]
#[command(about, long_about = None)]
struct ReportCli {
    /// Name of the scenario that finished
    #[arg(long)]
    scenario: String,

    /// How the scenario ended: success, failure or unknown
    #[arg(long)]
    outcome: Outcome,

    /// How long the scenario ran for, in seconds
    #[arg(long)]
    duration: f64,

    /// The run this execution belongs to
    #[arg(long, env = RUN_ID_ENV)]
    run_id: String,

    /// The branch the run was built from
    #[arg(long, env = BRANCH_ENV)]
    branch: String,

    /// The number of scenarios dispatched for this run
    #[arg(long, env = TOTAL_SCENARIOS_ENV)]
    total_scenarios: Option<u64>,

    /// Print the record instead of writing it to the metrics store
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[command(flatten)]
    metrics: MetricsConnection,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = ReportCli::parse();
    if !cli.outcome.is_terminal() {
        anyhow::bail!("Only a finished outcome can be reported, got `{}`", cli.outcome);
    }
    if !cli.duration.is_finite() || cli.duration < 0.0 {
        anyhow::bail!("Duration must be a non-negative number of seconds");
    }

    let run = Run::new(cli.run_id, cli.branch);
    let mut record = RunRecord::new(
        &run,
        cli.scenario,
        cli.outcome,
        Duration::from_secs_f64(cli.duration),
    );
    record.total_scenarios = cli.total_scenarios;

    log::info!(
        "Reporting {} for scenario {} in run {}",
        record.outcome,
        record.scenario,
        record.run_id
    );

    if cli.dry_run {
        let mut reporter = InMemoryReporter::new();
        reporter.report_outcome(record);
        return reporter.finalize().await;
    }

    let shutdown = ShutdownHandle::new();
    let mut reporter = InfluxClientReporter::new(cli.metrics.client(), shutdown.new_listener());
    reporter.report_outcome(record);
    reporter.finalize().await
}
