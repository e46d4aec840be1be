use crate::cli::required_scenario_name;
use crate::config::HangarConfig;
use crate::engine::{ContainerEngine, LaunchRequest, UnitStatus};
use crate::progress::{ObserveUnits, Observation};
use hangar_core::prelude::{poll_until, DelegatedShutdownListener};
use hangar_run_model::{Outcome, ScenarioExecution};

/// What happened to each scenario handed to [LocalDispatcher::run_all].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Scenarios that were launched, in launch order
    pub launched: Vec<String>,
    /// Scenarios the engine refused to launch. These are not retried.
    pub failed_launches: Vec<String>,
}

/// Runs scenarios as detached units on the local container engine, never more than a fixed
/// number at once.
pub struct LocalDispatcher<'a, E> {
    engine: &'a E,
    config: &'a HangarConfig,
}

impl<'a, E: ContainerEngine> LocalDispatcher<'a, E> {
    pub fn new(engine: &'a E, config: &'a HangarConfig) -> Self {
        Self { engine, config }
    }

    /// Launch every scenario, waiting for a free slot before each launch, then wait for all of
    /// them to finish.
    ///
    /// A slot is free when fewer than `concurrency_limit` units of this run are active. The limit
    /// is clamped to at least 1.
    pub async fn run_all(
        &self,
        scenarios: &[String],
        concurrency_limit: usize,
        shutdown: &mut DelegatedShutdownListener,
    ) -> anyhow::Result<DispatchSummary> {
        let limit = concurrency_limit.max(1);
        let env = self.config.unit_env(scenarios.len());
        let mut summary = DispatchSummary::default();

        log::info!(
            "Running {} scenarios for run {} with at most {} at once",
            scenarios.len(),
            self.config.run.run_id,
            limit
        );

        for scenario in scenarios {
            poll_until(
                &format!("a free slot to launch {}", scenario),
                self.config.poll(self.config.intervals.launch),
                shutdown,
                move || async move {
                    let active = self.active_units().await?;
                    Ok((active < limit).then_some(()))
                },
            )
            .await?;

            match self.launch(scenario, env.clone()).await {
                Ok(id) => {
                    log::info!("Launched {} as {}", scenario, id);
                    summary.launched.push(scenario.clone());
                }
                Err(e) => {
                    log::warn!("Failed to launch {}: {:?}", scenario, e);
                    self.discard_failed_launch(scenario).await;
                    summary.failed_launches.push(scenario.clone());
                }
            }
        }

        self.wait_for_completion(shutdown).await?;

        Ok(summary)
    }

    /// Launch a single scenario without waiting for a free slot.
    pub async fn run_one(&self, name: Option<&str>) -> anyhow::Result<String> {
        let scenario = required_scenario_name(name)?;

        let id = self.launch(scenario, self.config.unit_env(1)).await?;
        log::info!("Launched {} as {}", scenario, id);

        Ok(id)
    }

    /// Wait until no unit of this run is active.
    pub async fn wait_for_completion(
        &self,
        shutdown: &mut DelegatedShutdownListener,
    ) -> anyhow::Result<()> {
        poll_until(
            &format!("every scenario of run {} to finish", self.config.run.run_id),
            self.config.poll(self.config.intervals.join),
            shutdown,
            move || async move {
                let active = self.active_units().await?;
                if active > 0 {
                    log::debug!("{} scenarios still running", active);
                }
                Ok((active == 0).then_some(()))
            },
        )
        .await?;

        log::info!("All scenarios of run {} have finished", self.config.run.run_id);
        Ok(())
    }

    /// Describe every unit of this run, running or not.
    ///
    /// Finished units get their outcome from the markers in their logs.
    pub async fn collect(&self) -> anyhow::Result<Vec<ScenarioExecution>> {
        let units = self.units().await?;
        let mut executions = Vec::with_capacity(units.len());

        for unit in units {
            let details = self.engine.inspect(&unit.id).await?;

            let mut execution = ScenarioExecution::new(&unit.scenario, &unit.id);
            execution.started_at = details.started_at;
            execution.finished_at = details.finished_at;
            execution.outcome = if details.running || unit.is_active() {
                Outcome::Running
            } else {
                let logs = self.engine.logs(&unit.id).await?;
                Outcome::from_log(&logs)
            };

            if execution.outcome == Outcome::Unknown {
                log::warn!(
                    "Scenario {} reported neither success nor failure (exit code {:?})",
                    unit.scenario,
                    details.exit_code
                );
            }

            executions.push(execution);
        }

        executions.sort_by(|a, b| a.scenario.cmp(&b.scenario));
        Ok(executions)
    }

    /// Remove every unit of this run. Returns how many were removed.
    pub async fn clean(&self) -> anyhow::Result<usize> {
        let units = self.units().await?;
        for unit in &units {
            self.engine.remove(&unit.id).await?;
            log::debug!("Removed {}", unit.name);
        }

        log::info!(
            "Removed {} units of run {}",
            units.len(),
            self.config.run.run_id
        );
        Ok(units.len())
    }

    async fn launch(&self, scenario: &str, env: Vec<(String, String)>) -> anyhow::Result<String> {
        let request = LaunchRequest {
            name: self.config.run.unit_name(scenario),
            image: self.config.image.clone(),
            run_id: self.config.run.run_id.clone(),
            scenario: scenario.to_string(),
            env,
        };

        self.engine.launch(&request).await
    }

    /// Remove whatever a failed launch left behind.
    ///
    /// The engine may have created the unit before failing to start it. Such a unit stays active
    /// without ever running, which would hold a slot and block the final join.
    async fn discard_failed_launch(&self, scenario: &str) {
        let name = self.config.run.unit_name(scenario);
        let leftovers = match self.units().await {
            Ok(units) => units.into_iter().filter(|u| u.name == name),
            Err(e) => {
                log::warn!("Could not check for a leftover unit of {}: {:?}", scenario, e);
                return;
            }
        };

        for unit in leftovers {
            match self.engine.remove(&unit.id).await {
                Ok(()) => log::info!("Removed unit {} left by the failed launch", unit.id),
                Err(e) => log::warn!("Failed to remove leftover unit {}: {:?}", unit.id, e),
            }
        }
    }

    async fn units(&self) -> anyhow::Result<Vec<UnitStatus>> {
        self.engine.list_units(&self.config.run.run_id).await
    }

    async fn active_units(&self) -> anyhow::Result<usize> {
        Ok(self.units().await?.iter().filter(|u| u.is_active()).count())
    }
}

impl<E: ContainerEngine + Sync> ObserveUnits for LocalDispatcher<'_, E> {
    async fn observe(&self) -> anyhow::Result<Observation> {
        let units = self.units().await?;

        Ok(Observation {
            observed: units.len(),
            running: units.iter().filter(|u| u.is_active()).count(),
            nodes: None,
        })
    }
}
