use crate::cli::HangarCli;
use anyhow::Context;
use hangar_core::prelude::PollSettings;
use hangar_instruments::{MetricsConnection, BRANCH_ENV, RUN_ID_ENV, TOTAL_SCENARIOS_ENV};
use hangar_run_model::Run;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the orchestrator needs to know, resolved once at start-up.
///
/// Components receive this by reference and never read the process environment themselves.
#[derive(Debug, Clone)]
pub struct HangarConfig {
    pub run: Run,
    /// Full image reference, including the tag
    pub image: String,
    pub catalog_dir: PathBuf,
    pub skip_file: PathBuf,
    pub output_dir: PathBuf,
    pub metrics: MetricsConnection,
    pub slack_webhook_url: Option<String>,
    pub intervals: PollIntervals,
    /// Upper bound on any single wait. `None` waits until the condition holds or Ctrl-C.
    pub run_timeout: Option<Duration>,
    pub resources: PodResources,
    pub show_progress: bool,
}

/// How often each kind of wait re-checks external state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    /// Waiting for a free slot before launching the next local scenario
    pub launch: Duration,
    /// Waiting for every local scenario to finish
    pub join: Duration,
    /// Waiting for every pod to finish
    pub cluster: Duration,
    /// Refreshing a progress watch
    pub progress: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            launch: Duration::from_secs(5),
            join: Duration::from_secs(10),
            cluster: Duration::from_secs(60),
            progress: Duration::from_secs(15),
        }
    }
}

/// Resource requests and limits for each scenario pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodResources {
    pub cpu: String,
    pub memory_request: String,
    pub memory_limit: String,
}

impl Default for PodResources {
    fn default() -> Self {
        Self {
            cpu: "1".to_string(),
            memory_request: "1Gi".to_string(),
            memory_limit: "4Gi".to_string(),
        }
    }
}

impl HangarConfig {
    pub fn from_cli(cli: &HangarCli) -> anyhow::Result<Self> {
        let commit = cli
            .commit
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .context("No commit set, pass `--commit` or set `COMMIT`")?;

        let run = Run::new(commit, cli.branch.trim());
        if run.namespace().is_empty() {
            anyhow::bail!("Commit `{}` cannot be used as a namespace name", commit);
        }

        Ok(Self {
            image: image_reference(&cli.image, commit),
            run,
            catalog_dir: cli.catalog_dir.clone(),
            skip_file: cli.skip_file.clone(),
            output_dir: cli.output_dir.clone(),
            metrics: cli.metrics.clone(),
            slack_webhook_url: cli.slack_webhook_url.clone().filter(|u| !u.is_empty()),
            intervals: PollIntervals::default(),
            run_timeout: cli.run_timeout.map(Duration::from_secs),
            resources: PodResources::default(),
            show_progress: !cli.no_progress,
        })
    }

    /// Working directory owned by this run.
    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(&self.run.run_id)
    }

    /// Ledger of run records written by this host for this run.
    pub fn ledger_path(&self) -> PathBuf {
        self.run_dir().join("records.jsonl")
    }

    pub fn poll(&self, interval: Duration) -> PollSettings {
        PollSettings::every(interval).with_timeout(self.run_timeout)
    }

    /// Environment handed to every execution unit so it can report its own outcome.
    pub fn unit_env(&self, total_scenarios: usize) -> Vec<(String, String)> {
        let mut env = vec![
            (RUN_ID_ENV.to_string(), self.run.run_id.clone()),
            (BRANCH_ENV.to_string(), self.run.branch.clone()),
            (TOTAL_SCENARIOS_ENV.to_string(), total_scenarios.to_string()),
        ];
        env.extend(self.metrics.to_env());
        env
    }
}

/// Append the commit as the tag unless the repository already carries one.
fn image_reference(image: &str, commit: &str) -> String {
    let name = image.rsplit('/').next().unwrap_or(image);
    if name.contains(':') || name.contains('@') {
        image.to_string()
    } else {
        format!("{}:{}", image, commit)
    }
}
