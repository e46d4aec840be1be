use clap::{Parser, Subcommand, ValueEnum};
use hangar_instruments::MetricsConnection;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hangar", about, long_about = None)]
pub struct HangarCli {
    #[command(subcommand)]
    pub command: Option<HangarCommand>,

    /// The commit the scenario image was built from. Used as the run id.
    #[arg(long, global = true, env = "COMMIT")]
    pub commit: Option<String>,

    /// The branch the commit belongs to.
    #[arg(long, global = true, env = "BRANCH", default_value = "main")]
    pub branch: String,

    /// Scenario image repository. The commit is used as the tag unless one is given.
    #[arg(long, global = true, env = "HANGAR_IMAGE", default_value = "hangar-scenarios")]
    pub image: String,

    /// Directory containing one file per scenario.
    #[arg(long, global = true, env = "HANGAR_CATALOG_DIR", default_value = "scenarios")]
    pub catalog_dir: PathBuf,

    /// File listing scenarios that must not be run, one per line.
    #[arg(long, global = true, env = "HANGAR_SKIP_FILE", default_value = "skip.txt")]
    pub skip_file: PathBuf,

    /// Directory under which each run gets its own working directory.
    #[arg(long, global = true, env = "HANGAR_OUTPUT_DIR", default_value = "hangar-runs")]
    pub output_dir: PathBuf,

    /// Give up waiting for a run after this many seconds. Waits forever when not set.
    #[arg(long, global = true, env = "HANGAR_RUN_TIMEOUT")]
    pub run_timeout: Option<u64>,

    /// Slack-compatible incoming webhook that run reports are posted to.
    #[arg(long, global = true, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,

    /// Do not show a progress bar when watching progress.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at
    /// by anyone and is just adding noise to the logs.
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    #[command(flatten)]
    pub metrics: MetricsConnection,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HangarCommand {
    /// Build the scenario image.
    BuildImage {
        /// Build context passed to the container engine.
        #[arg(long, default_value = ".")]
        context: PathBuf,
    },
    /// Push the scenario image to its registry.
    PushImage,
    /// Run every scenario in the catalog on the local container engine.
    RunAllLocal {
        /// Maximum number of scenarios to run at once. Defaults to the number of logical cores.
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Run a single scenario on the local container engine.
    RunOneLocal { name: Option<String> },
    /// Print the outcome of every scenario of this run on the local container engine.
    ResultsLocal,
    /// Write the outcomes of this run on the local container engine to the metrics store.
    WriteLocal,
    /// Show how far this run on the local container engine has got.
    ProgressLocal(ProgressArgs),
    /// Remove every local container of this run.
    CleanLocal,
    /// Run every scenario in the catalog on the cluster, one pod per scenario.
    RunAllCluster {
        /// Wait for every pod to finish before returning.
        #[arg(long)]
        wait: bool,
    },
    /// Run a single scenario on the cluster.
    RunOneCluster { name: Option<String> },
    /// Show how far this run on the cluster has got.
    ProgressCluster(ProgressArgs),
    /// Wait until no pod of this run is pending or running.
    WaitCluster,
    /// Delete the run's namespace and every pod in it.
    CleanAllCluster,
    /// Summarise the run from the metrics store and send the report to the notification channel.
    Report {
        /// Read run records from a ledger file instead of the metrics store.
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct ProgressArgs {
    /// How to print the progress snapshot.
    #[arg(long, value_enum, default_value_t = ProgressFormat::Human)]
    pub format: ProgressFormat,

    /// Keep watching until every scenario has finished.
    #[arg(long)]
    pub watch: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressFormat {
    /// A human-readable line
    Human,
    /// InfluxDB line protocol
    Metrics,
    /// A JSON object
    Json,
}

/// The command line was parsed but cannot be acted on. Exits with code 1 and a usage hint.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("A scenario name is required, e.g. `hangar run-one-local <name>`")]
    MissingScenarioName,
}

/// The scenario a `run-one-*` command was given, trimmed. Blank names count as missing.
pub fn required_scenario_name(name: Option<&str>) -> Result<&str, UsageError> {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(UsageError::MissingScenarioName)
}
