use crate::command::CliCommand;
use crate::engine::{
    ContainerEngine, LaunchRequest, UnitDetails, UnitState, UnitStatus, RUN_LABEL, SCENARIO_LABEL,
};
use anyhow::Context;
use chrono::{DateTime, Datelike, Utc};
use std::path::{Path, PathBuf};

const UNIT_FORMAT: &str = "{{.ID}}\t{{.Names}}\t{{.State}}\t{{.Label \"hangar.scenario\"}}";
const DETAILS_FORMAT: &str =
    "{{.State.StartedAt}}|{{.State.FinishedAt}}|{{.State.Running}}|{{.State.ExitCode}}";

/// The local container engine, driven through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    /// Find `docker` on the `PATH`.
    pub fn locate() -> anyhow::Result<Self> {
        let binary = which::which("docker").context("Could not find `docker` on the PATH")?;
        log::debug!("Using container engine at {}", binary.display());

        Ok(Self { binary })
    }

    fn command(&self) -> CliCommand {
        CliCommand::new(&self.binary)
    }

    pub async fn build_image(&self, image: &str, context: &Path) -> anyhow::Result<()> {
        log::info!("Building image {} from {}", image, context.display());
        self.command()
            .args(["build", "-t", image])
            .arg(context)
            .output()
            .await
            .with_context(|| format!("Failed to build image {}", image))?;

        Ok(())
    }

    pub async fn push_image(&self, image: &str) -> anyhow::Result<()> {
        log::info!("Pushing image {}", image);
        self.command()
            .args(["push", image])
            .output()
            .await
            .with_context(|| format!("Failed to push image {}", image))?;

        Ok(())
    }
}

impl ContainerEngine for DockerCli {
    async fn launch(&self, request: &LaunchRequest) -> anyhow::Result<String> {
        // Values are passed through the environment of the docker process so that credentials
        // never show up in the command line.
        let mut command = self
            .command()
            .args(["run", "-d", "--name", request.name.as_str()])
            .arg("--label")
            .arg(format!("{}={}", RUN_LABEL, request.run_id))
            .arg("--label")
            .arg(format!("{}={}", SCENARIO_LABEL, request.scenario));
        for (key, value) in &request.env {
            command = command.args(["-e", key.as_str()]).env(key, value);
        }

        let id = command
            .args([&request.image, &request.scenario])
            .output()
            .await
            .with_context(|| format!("Failed to launch {}", request.name))?;

        Ok(id.trim().to_string())
    }

    async fn list_units(&self, run_id: &str) -> anyhow::Result<Vec<UnitStatus>> {
        let out = self
            .command()
            .args(["ps", "-a", "--no-trunc", "--filter"])
            .arg(format!("label={}={}", RUN_LABEL, run_id))
            .args(["--format", UNIT_FORMAT])
            .output()
            .await
            .with_context(|| format!("Failed to list units of run {}", run_id))?;

        out.lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_unit_line)
            .collect()
    }

    async fn inspect(&self, id: &str) -> anyhow::Result<UnitDetails> {
        let out = self
            .command()
            .args(["inspect", "--format", DETAILS_FORMAT, id])
            .output()
            .await
            .with_context(|| format!("Failed to inspect unit {}", id))?;

        parse_unit_details(out.trim())
    }

    async fn logs(&self, id: &str) -> anyhow::Result<String> {
        self.command()
            .args(["logs", id])
            .merge_stderr()
            .output()
            .await
            .with_context(|| format!("Failed to read logs of unit {}", id))
    }

    async fn remove(&self, id: &str) -> anyhow::Result<()> {
        self.command()
            .args(["rm", "-f", id])
            .output()
            .await
            .with_context(|| format!("Failed to remove unit {}", id))?;

        Ok(())
    }
}

fn parse_unit_line(line: &str) -> anyhow::Result<UnitStatus> {
    let mut parts = line.split('\t');
    let (Some(id), Some(name), Some(state), scenario) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        anyhow::bail!("Unexpected unit listing: {}", line);
    };

    let state = match state.trim() {
        "exited" | "dead" => UnitState::Exited,
        _ => UnitState::Active,
    };

    Ok(UnitStatus {
        id: id.trim().to_string(),
        name: name.trim().to_string(),
        scenario: scenario.unwrap_or_default().trim().to_string(),
        state,
    })
}

fn parse_unit_details(line: &str) -> anyhow::Result<UnitDetails> {
    let parts = line.split('|').collect::<Vec<_>>();
    let [started_at, finished_at, running, exit_code] = parts.as_slice() else {
        anyhow::bail!("Unexpected inspect output: {}", line);
    };

    Ok(UnitDetails {
        started_at: parse_engine_time(started_at)?,
        finished_at: parse_engine_time(finished_at)?,
        running: running
            .trim()
            .parse()
            .with_context(|| format!("Invalid running flag: {}", running))?,
        exit_code: exit_code.trim().parse().ok(),
    })
}

/// The engine reports year 1 for times that have not happened yet.
fn parse_engine_time(value: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let time = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid time: {}", value))?
        .with_timezone(&Utc);

    Ok((time.year() > 1).then_some(time))
}
