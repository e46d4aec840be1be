use crate::cli::required_scenario_name;
use crate::config::HangarConfig;
use crate::pod::PodDescriptor;
use crate::progress::{ObserveUnits, Observation};
use crate::scheduler::{ClusterError, ClusterScheduler, PodStatus};
use anyhow::Context;
use hangar_core::prelude::{poll_until, DelegatedShutdownListener};

/// Runs each scenario as one pod inside a namespace owned by the run.
pub struct ClusterDispatcher<'a, S> {
    scheduler: &'a S,
    config: &'a HangarConfig,
}

impl<'a, S: ClusterScheduler> ClusterDispatcher<'a, S> {
    pub fn new(scheduler: &'a S, config: &'a HangarConfig) -> Self {
        Self { scheduler, config }
    }

    pub fn namespace(&self) -> String {
        self.config.run.namespace()
    }

    /// Create the run's namespace and submit one pod per scenario.
    ///
    /// Fails before submitting anything if the namespace already exists. A pod that cannot be
    /// submitted does not stop the others, the failures are reported together at the end.
    pub async fn run_all(&self, scenarios: &[String]) -> anyhow::Result<Vec<String>> {
        let namespace = self.namespace();
        self.scheduler
            .create_namespace(&namespace)
            .await
            .with_context(|| format!("Cannot start run {}", self.config.run.run_id))?;
        log::info!("Created namespace {}", namespace);

        let mut submitted = Vec::with_capacity(scenarios.len());
        let mut failed = Vec::new();
        for scenario in scenarios {
            let pod = PodDescriptor::for_scenario(self.config, scenario, scenarios.len());
            match self.scheduler.submit(&pod).await {
                Ok(()) => {
                    log::info!("Submitted {} as pod {}", scenario, pod.metadata.name);
                    submitted.push(scenario.clone());
                }
                Err(e) => {
                    log::warn!("Failed to submit {}: {:?}", scenario, e);
                    failed.push(scenario.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(ClusterError::SubmissionFailed {
                failed: failed.len(),
                total: scenarios.len(),
                scenarios: failed,
            }
            .into());
        }

        Ok(submitted)
    }

    /// Submit a single scenario, reusing the run's namespace if it already exists.
    pub async fn run_one(&self, name: Option<&str>) -> anyhow::Result<String> {
        let scenario = required_scenario_name(name)?;

        let namespace = self.namespace();
        match self.scheduler.create_namespace(&namespace).await {
            Ok(()) => log::info!("Created namespace {}", namespace),
            Err(e) if matches!(
                e.downcast_ref::<ClusterError>(),
                Some(ClusterError::NamespaceExists { .. })
            ) =>
            {
                log::info!("Reusing namespace {}", namespace)
            }
            Err(e) => return Err(e),
        }

        let pod = PodDescriptor::for_scenario(self.config, scenario, 1);
        self.scheduler.submit(&pod).await?;
        log::info!("Submitted {} as pod {}", scenario, pod.metadata.name);

        Ok(pod.metadata.name)
    }

    /// Wait until no pod in the namespace is pending or running.
    pub async fn wait_for_completion(
        &self,
        shutdown: &mut DelegatedShutdownListener,
    ) -> anyhow::Result<Vec<PodStatus>> {
        let namespace = self.namespace();
        let scope = namespace.clone();
        let pods = poll_until(
            &format!("every pod in namespace {} to finish", namespace),
            self.config.poll(self.config.intervals.cluster),
            shutdown,
            move || {
                let namespace = scope.clone();
                async move {
                    let pods = self.scheduler.list_pods(&namespace).await?;
                    let active = pods.iter().filter(|p| p.phase.is_active()).count();
                    if active > 0 {
                        log::debug!("{} of {} pods still active", active, pods.len());
                    }

                    Ok((active == 0).then_some(pods))
                }
            },
        )
        .await?;

        log::info!("Every pod in namespace {} has finished", namespace);
        Ok(pods)
    }

    /// Delete the run's namespace and every pod in it.
    pub async fn clean(&self) -> anyhow::Result<()> {
        let namespace = self.namespace();
        self.scheduler.delete_namespace(&namespace).await?;
        log::info!("Deleted namespace {}", namespace);

        Ok(())
    }
}

impl<S: ClusterScheduler + Sync> ObserveUnits for ClusterDispatcher<'_, S> {
    async fn observe(&self) -> anyhow::Result<Observation> {
        let pods = self.scheduler.list_pods(&self.namespace()).await?;
        let nodes = self.scheduler.node_count().await?;

        Ok(Observation {
            observed: pods.len(),
            running: pods.iter().filter(|p| p.phase.is_active()).count(),
            nodes: Some(nodes),
        })
    }
}
