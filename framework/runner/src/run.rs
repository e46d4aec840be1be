use anyhow::Context;
use hangar_core::prelude::DelegatedShutdownListener;
use hangar_instruments::{InfluxClientReporter, OutcomeReporter};
use hangar_run_model::append_new_run_records;
use hangar_summariser::{
    deliver, summarize_run, InMemoryRunRecordStore, InfluxRunRecordStore, SlackWebhookSink,
    StdoutSink,
};
use std::path::Path;

use crate::catalog::ScenarioCatalog;
use crate::cli::{
    required_scenario_name, HangarCli, HangarCommand, ProgressArgs, ProgressFormat,
};
use crate::cluster::ClusterDispatcher;
use crate::config::HangarConfig;
use crate::docker::DockerCli;
use crate::kubectl::KubectlCli;
use crate::local::LocalDispatcher;
use crate::monitor::available_cores;
use crate::progress::{ObserveUnits, ProgressSnapshot, ProgressTracker};
use crate::results::executions_table;
use crate::shutdown::start_shutdown_listener;

/// Run one subcommand to completion.
///
/// The caller handles the case where no subcommand was given.
pub fn run(cli: HangarCli) -> anyhow::Result<()> {
    let Some(command) = cli.command.clone() else {
        anyhow::bail!("No command given");
    };

    let config = HangarConfig::from_cli(&cli)?;
    log::debug!("Running {:?} with {:?}", command, config.run);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);

    runtime.block_on(execute(command, &config, shutdown_handle.new_listener()))
}

async fn execute(
    command: HangarCommand,
    config: &HangarConfig,
    mut shutdown: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    match command {
        HangarCommand::BuildImage { context } => {
            DockerCli::locate()?
                .build_image(&config.image, &context)
                .await
        }
        HangarCommand::PushImage => DockerCli::locate()?.push_image(&config.image).await,
        HangarCommand::RunAllLocal { concurrency } => {
            let scenarios = catalog(config).list_scenarios()?;
            let limit = concurrency.unwrap_or_else(available_cores);

            let engine = DockerCli::locate()?;
            let summary = LocalDispatcher::new(&engine, config)
                .run_all(&scenarios, limit, &mut shutdown)
                .await?;

            println!(
                "Launched {} of {} scenarios for run {}",
                summary.launched.len(),
                scenarios.len(),
                config.run.run_id
            );
            if !summary.failed_launches.is_empty() {
                log::warn!(
                    "These scenarios could not be launched and will have no outcome: {}",
                    summary.failed_launches.join(", ")
                );
            }
            Ok(())
        }
        HangarCommand::RunOneLocal { name } => {
            let scenario = required_scenario_name(name.as_deref())?;
            let engine = DockerCli::locate()?;
            LocalDispatcher::new(&engine, config)
                .run_one(Some(scenario))
                .await?;
            Ok(())
        }
        HangarCommand::ResultsLocal => {
            let engine = DockerCli::locate()?;
            let executions = LocalDispatcher::new(&engine, config).collect().await?;
            println!("{}", executions_table(&executions));
            Ok(())
        }
        HangarCommand::WriteLocal => {
            let total = catalog(config).list_scenarios()?.len();
            let engine = DockerCli::locate()?;
            let executions = LocalDispatcher::new(&engine, config).collect().await?;

            write_local_records(config, &executions, total as u64, shutdown).await
        }
        HangarCommand::ProgressLocal(args) => {
            let total = catalog(config).list_scenarios()?.len();
            let engine = DockerCli::locate()?;
            let dispatcher = LocalDispatcher::new(&engine, config);

            let tracker = ProgressTracker::new(format!("run {}", config.run.run_id), total);
            show_progress(config, &tracker, &dispatcher, &args, &mut shutdown).await
        }
        HangarCommand::CleanLocal => {
            let engine = DockerCli::locate()?;
            let removed = LocalDispatcher::new(&engine, config).clean().await?;
            println!("Removed {} units of run {}", removed, config.run.run_id);
            Ok(())
        }
        HangarCommand::RunAllCluster { wait } => {
            let scenarios = catalog(config).list_scenarios()?;
            let scheduler = KubectlCli::locate()?;
            let dispatcher = ClusterDispatcher::new(&scheduler, config);

            let submitted = dispatcher.run_all(&scenarios).await?;
            println!(
                "Submitted {} scenarios to namespace {}",
                submitted.len(),
                dispatcher.namespace()
            );

            if wait {
                dispatcher.wait_for_completion(&mut shutdown).await?;
            }
            Ok(())
        }
        HangarCommand::RunOneCluster { name } => {
            let scenario = required_scenario_name(name.as_deref())?;
            let scheduler = KubectlCli::locate()?;
            ClusterDispatcher::new(&scheduler, config)
                .run_one(Some(scenario))
                .await?;
            Ok(())
        }
        HangarCommand::ProgressCluster(args) => {
            let total = catalog(config).list_scenarios()?.len();
            let scheduler = KubectlCli::locate()?;
            let dispatcher = ClusterDispatcher::new(&scheduler, config);

            let tracker =
                ProgressTracker::new(format!("namespace {}", dispatcher.namespace()), total);
            show_progress(config, &tracker, &dispatcher, &args, &mut shutdown).await
        }
        HangarCommand::WaitCluster => {
            let scheduler = KubectlCli::locate()?;
            let pods = ClusterDispatcher::new(&scheduler, config)
                .wait_for_completion(&mut shutdown)
                .await?;
            for pod in &pods {
                match &pod.reason {
                    Some(reason) => {
                        println!("{}: {} ({})", pod.scenario, pod.phase.outcome(), reason)
                    }
                    None => println!("{}: {}", pod.scenario, pod.phase.outcome()),
                }
            }
            println!("{} pods finished", pods.len());
            Ok(())
        }
        HangarCommand::CleanAllCluster => {
            let scheduler = KubectlCli::locate()?;
            ClusterDispatcher::new(&scheduler, config).clean().await
        }
        HangarCommand::Report { ledger } => report(config, ledger.as_deref()).await,
    }
}

fn catalog(config: &HangarConfig) -> ScenarioCatalog {
    ScenarioCatalog::new(&config.catalog_dir, &config.skip_file)
}

async fn show_progress<O: ObserveUnits>(
    config: &HangarConfig,
    tracker: &ProgressTracker,
    source: &O,
    args: &ProgressArgs,
    shutdown: &mut DelegatedShutdownListener,
) -> anyhow::Result<()> {
    let snapshot = if args.watch {
        // The bar would interleave with machine-readable output
        let show_bar = config.show_progress && args.format == ProgressFormat::Human;
        tracker
            .watch(
                source,
                config.poll(config.intervals.progress),
                shutdown,
                show_bar,
            )
            .await?
    } else {
        tracker.snapshot(source).await?
    };

    println!("{}", format_snapshot(config, &snapshot, args.format)?);
    Ok(())
}

fn format_snapshot(
    config: &HangarConfig,
    snapshot: &ProgressSnapshot,
    format: ProgressFormat,
) -> anyhow::Result<String> {
    match format {
        ProgressFormat::Human => Ok(snapshot.to_string()),
        ProgressFormat::Metrics => {
            let now = u128::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
            snapshot.to_line_protocol(&config.run.run_id, now)
        }
        ProgressFormat::Json => snapshot.to_json(),
    }
}

/// Append the finished executions to the run ledger and publish them to the metrics store.
async fn write_local_records(
    config: &HangarConfig,
    executions: &[hangar_run_model::ScenarioExecution],
    total_scenarios: u64,
    shutdown: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    let records = executions
        .iter()
        .filter_map(|e| e.to_record(&config.run, Some(total_scenarios)))
        .collect::<Vec<_>>();
    let unfinished = executions.len() - records.len();
    if unfinished > 0 {
        log::warn!("{} scenarios have not finished and were not written", unfinished);
    }

    let ledger = config.ledger_path();
    std::fs::create_dir_all(config.run_dir())
        .with_context(|| format!("Failed to create {}", config.run_dir().display()))?;
    let added = append_new_run_records(&records, &ledger)?;
    log::info!(
        "Appended {} records to {}, {} were already there",
        added.len(),
        ledger.display(),
        records.len() - added.len()
    );

    let mut reporter = InfluxClientReporter::new(config.metrics.client(), shutdown);
    for record in &added {
        reporter.report_outcome(record.clone());
    }
    reporter.finalize().await?;

    println!("Wrote {} new run records for run {}", added.len(), config.run.run_id);
    Ok(())
}

async fn report(config: &HangarConfig, ledger: Option<&Path>) -> anyhow::Result<()> {
    let run_id = &config.run.run_id;
    let report = match ledger {
        Some(ledger) => {
            let store = InMemoryRunRecordStore::from_ledger(ledger)?;
            summarize_run(&store, run_id).await
        }
        None => {
            let store = InfluxRunRecordStore::new(config.metrics.client());
            summarize_run(&store, run_id).await
        }
    };
    let text = report.render();

    match &config.slack_webhook_url {
        Some(url) => deliver(&SlackWebhookSink::new(url), &text).await,
        None => deliver(&StdoutSink, &text).await,
    }

    Ok(())
}
