//! In-memory stand-ins for the container engine and cluster scheduler.
//!
//! Time is measured in listings: every call to [ContainerEngine::list_units] or
//! [ClusterScheduler::list_pods] is one tick, and a unit finishes after a configurable number of
//! ticks.

use crate::config::{HangarConfig, PodResources, PollIntervals};
use crate::engine::{ContainerEngine, LaunchRequest, UnitDetails, UnitState, UnitStatus};
use crate::pod::PodDescriptor;
use crate::scheduler::{ClusterError, ClusterScheduler, PodPhase, PodStatus};
use chrono::Utc;
use hangar_instruments::MetricsConnection;
use hangar_run_model::{Run, FAILURE_MARKER, SUCCESS_MARKER};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// A config that polls every millisecond and gives up after ten seconds.
pub fn fast_config(run_id: &str, dir: &Path) -> HangarConfig {
    let every = Duration::from_millis(1);

    HangarConfig {
        run: Run::new(run_id, "main"),
        image: format!("hangar-scenarios:{}", run_id),
        catalog_dir: dir.join("scenarios"),
        skip_file: dir.join("skip.txt"),
        output_dir: dir.join("runs"),
        metrics: MetricsConnection {
            host: "127.0.0.1:1".to_string(),
            user: String::new(),
            password: String::new(),
            tls: false,
            database: "hangar".to_string(),
        },
        slack_webhook_url: None,
        intervals: PollIntervals {
            launch: every,
            join: every,
            cluster: every,
            progress: every,
        },
        run_timeout: Some(Duration::from_secs(10)),
        resources: PodResources::default(),
        show_progress: false,
    }
}

#[derive(Debug, Clone)]
struct FakeUnit {
    id: String,
    run_id: String,
    status: UnitStatus,
    remaining_ticks: usize,
    /// Created but never started, so it stays active until removed
    stuck: bool,
    details: UnitDetails,
    logs: String,
}

#[derive(Debug, Default)]
struct EngineState {
    units: Vec<FakeUnit>,
    launches: Vec<LaunchRequest>,
    max_active: usize,
    next_id: usize,
}

/// A container engine whose units run for a fixed number of ticks.
#[derive(Debug)]
pub struct FakeEngine {
    ticks_to_finish: usize,
    failing_scenarios: HashSet<String>,
    refused_scenarios: HashSet<String>,
    stranded_scenarios: HashSet<String>,
    silent_scenarios: HashSet<String>,
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new(ticks_to_finish: usize) -> Self {
        Self {
            ticks_to_finish,
            failing_scenarios: HashSet::new(),
            refused_scenarios: HashSet::new(),
            stranded_scenarios: HashSet::new(),
            silent_scenarios: HashSet::new(),
            state: Mutex::new(EngineState::default()),
        }
    }

    /// The scenario logs a failure marker instead of a success marker.
    pub fn failing(mut self, scenario: &str) -> Self {
        self.failing_scenarios.insert(scenario.to_string());
        self
    }

    /// Launching the scenario fails.
    pub fn refusing(mut self, scenario: &str) -> Self {
        self.refused_scenarios.insert(scenario.to_string());
        self
    }

    /// Launching the scenario fails after its unit was created, leaving the unit behind in the
    /// `created` state.
    pub fn stranding(mut self, scenario: &str) -> Self {
        self.stranded_scenarios.insert(scenario.to_string());
        self
    }

    /// The scenario finishes without logging either marker.
    pub fn silent(mut self, scenario: &str) -> Self {
        self.silent_scenarios.insert(scenario.to_string());
        self
    }

    /// Every accepted launch, in order.
    pub fn launches(&self) -> Vec<LaunchRequest> {
        self.state.lock().launches.clone()
    }

    pub fn launched_scenarios(&self) -> Vec<String> {
        self.launches().into_iter().map(|l| l.scenario).collect()
    }

    /// The most units that were active at once, counted at each launch.
    pub fn max_active(&self) -> usize {
        self.state.lock().max_active
    }

    pub fn unit_count(&self) -> usize {
        self.state.lock().units.len()
    }

    fn tick(&self, state: &mut EngineState) {
        for unit in state.units.iter_mut() {
            if unit.status.state != UnitState::Active || unit.stuck {
                continue;
            }

            unit.remaining_ticks = unit.remaining_ticks.saturating_sub(1);
            if unit.remaining_ticks == 0 {
                unit.status.state = UnitState::Exited;
                unit.details.running = false;
                unit.details.finished_at = Some(Utc::now());

                let scenario = &unit.status.scenario;
                unit.details.exit_code = Some(0);
                if self.silent_scenarios.contains(scenario) {
                    unit.logs = format!("{} did not say how it went\n", scenario);
                } else if self.failing_scenarios.contains(scenario) {
                    unit.details.exit_code = Some(1);
                    unit.logs = format!("{} {}\n", scenario, FAILURE_MARKER);
                } else {
                    unit.logs = format!("{} {}\n", scenario, SUCCESS_MARKER);
                }
            }
        }
    }
}

impl ContainerEngine for FakeEngine {
    async fn launch(&self, request: &LaunchRequest) -> anyhow::Result<String> {
        if self.refused_scenarios.contains(&request.scenario) {
            anyhow::bail!("No such image: {}", request.image);
        }

        let stranded = self.stranded_scenarios.contains(&request.scenario);
        let mut state = self.state.lock();
        let id = format!("unit-{}", state.next_id);
        state.next_id += 1;
        state.units.push(FakeUnit {
            id: id.clone(),
            run_id: request.run_id.clone(),
            status: UnitStatus {
                id: id.clone(),
                name: request.name.clone(),
                scenario: request.scenario.clone(),
                state: UnitState::Active,
            },
            remaining_ticks: self.ticks_to_finish.max(1),
            stuck: stranded,
            details: UnitDetails {
                started_at: (!stranded).then(Utc::now),
                finished_at: None,
                running: !stranded,
                exit_code: None,
            },
            logs: String::new(),
        });
        if stranded {
            anyhow::bail!("OCI runtime create failed: exec: \"{}\": not found", request.scenario);
        }
        state.launches.push(request.clone());

        let active = state
            .units
            .iter()
            .filter(|u| u.run_id == request.run_id && u.status.is_active())
            .count();
        state.max_active = state.max_active.max(active);

        Ok(id)
    }

    async fn list_units(&self, run_id: &str) -> anyhow::Result<Vec<UnitStatus>> {
        let mut state = self.state.lock();
        self.tick(&mut state);

        Ok(state
            .units
            .iter()
            .filter(|u| u.run_id == run_id)
            .map(|u| u.status.clone())
            .collect())
    }

    async fn inspect(&self, id: &str) -> anyhow::Result<UnitDetails> {
        self.state
            .lock()
            .units
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.details.clone())
            .ok_or_else(|| anyhow::anyhow!("No such unit: {}", id))
    }

    async fn logs(&self, id: &str) -> anyhow::Result<String> {
        self.state
            .lock()
            .units
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.logs.clone())
            .ok_or_else(|| anyhow::anyhow!("No such unit: {}", id))
    }

    async fn remove(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let before = state.units.len();
        state.units.retain(|u| u.id != id);
        if state.units.len() == before {
            anyhow::bail!("No such unit: {}", id);
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
struct FakePod {
    pod: PodDescriptor,
    remaining_ticks: usize,
    phase: PodPhase,
}

#[derive(Debug, Default)]
struct SchedulerState {
    namespaces: HashSet<String>,
    pods: HashMap<String, Vec<FakePod>>,
    submitted: Vec<PodDescriptor>,
}

/// A cluster scheduler whose pods run for a fixed number of ticks.
#[derive(Debug)]
pub struct FakeScheduler {
    nodes: usize,
    ticks_to_finish: usize,
    failing_scenarios: HashSet<String>,
    refused_scenarios: HashSet<String>,
    state: Mutex<SchedulerState>,
}

impl FakeScheduler {
    pub fn new(nodes: usize, ticks_to_finish: usize) -> Self {
        Self {
            nodes,
            ticks_to_finish,
            failing_scenarios: HashSet::new(),
            refused_scenarios: HashSet::new(),
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Pretend a namespace was left behind by an earlier invocation.
    pub fn with_namespace(self, namespace: &str) -> Self {
        self.state.lock().namespaces.insert(namespace.to_string());
        self
    }

    /// The scenario's pod ends in the `Failed` phase.
    pub fn failing(mut self, scenario: &str) -> Self {
        self.failing_scenarios.insert(scenario.to_string());
        self
    }

    /// Submitting the scenario's pod fails.
    pub fn refusing(mut self, scenario: &str) -> Self {
        self.refused_scenarios.insert(scenario.to_string());
        self
    }

    pub fn submitted(&self) -> Vec<PodDescriptor> {
        self.state.lock().submitted.clone()
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.state.lock().namespaces.contains(namespace)
    }
}

impl ClusterScheduler for FakeScheduler {
    async fn create_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        if !self.state.lock().namespaces.insert(namespace.to_string()) {
            return Err(ClusterError::NamespaceExists {
                namespace: namespace.to_string(),
            }
            .into());
        }

        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if !state.namespaces.remove(namespace) {
            anyhow::bail!("namespaces \"{}\" not found", namespace);
        }
        state.pods.remove(namespace);

        Ok(())
    }

    async fn submit(&self, pod: &PodDescriptor) -> anyhow::Result<()> {
        if self.refused_scenarios.contains(pod.scenario()) {
            anyhow::bail!("admission webhook denied pod {}", pod.metadata.name);
        }

        let mut state = self.state.lock();
        if !state.namespaces.contains(&pod.metadata.namespace) {
            anyhow::bail!("namespaces \"{}\" not found", pod.metadata.namespace);
        }

        state.submitted.push(pod.clone());
        state
            .pods
            .entry(pod.metadata.namespace.clone())
            .or_default()
            .push(FakePod {
                pod: pod.clone(),
                remaining_ticks: self.ticks_to_finish.max(1),
                phase: PodPhase::Pending,
            });

        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> anyhow::Result<Vec<PodStatus>> {
        let mut state = self.state.lock();
        let Some(pods) = state.pods.get_mut(namespace) else {
            return Ok(Vec::new());
        };

        for pod in pods.iter_mut() {
            if !pod.phase.is_active() {
                continue;
            }

            pod.remaining_ticks = pod.remaining_ticks.saturating_sub(1);
            pod.phase = if pod.remaining_ticks > 0 {
                PodPhase::Running
            } else if self.failing_scenarios.contains(pod.pod.scenario()) {
                PodPhase::Failed
            } else {
                PodPhase::Succeeded
            };
        }

        Ok(pods
            .iter()
            .map(|pod| PodStatus {
                name: pod.pod.metadata.name.clone(),
                scenario: pod.pod.scenario().to_string(),
                phase: pod.phase,
                reason: (pod.phase == PodPhase::Failed).then(|| "Error".to_string()),
            })
            .collect())
    }

    async fn node_count(&self) -> anyhow::Result<usize> {
        Ok(self.nodes)
    }
}
