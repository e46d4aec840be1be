use chrono::{DateTime, Utc};
use std::future::Future;

/// Label carrying the run id on every local execution unit.
pub const RUN_LABEL: &str = "hangar.run";
/// Label carrying the scenario name on every local execution unit.
pub const SCENARIO_LABEL: &str = "hangar.scenario";

/// Everything needed to start one detached execution unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Unit name, `{scenario}-{run_id}`
    pub name: String,
    pub image: String,
    pub run_id: String,
    pub scenario: String,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Created, running, paused or restarting
    Active,
    /// Exited or dead
    Exited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    pub id: String,
    pub name: String,
    pub scenario: String,
    pub state: UnitState,
}

impl UnitStatus {
    pub fn is_active(&self) -> bool {
        self.state == UnitState::Active
    }
}

/// Timing reported by the container engine for a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDetails {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub running: bool,
    pub exit_code: Option<i64>,
}

/// The operations the local dispatcher needs from a container engine.
///
/// Units are discovered through their [RUN_LABEL], so the engine is the only record of what has
/// been launched for a run.
pub trait ContainerEngine {
    /// Start a detached unit, returning its id.
    fn launch(
        &self,
        request: &LaunchRequest,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;

    /// Every unit labelled with the run id, running or not.
    fn list_units(
        &self,
        run_id: &str,
    ) -> impl Future<Output = anyhow::Result<Vec<UnitStatus>>> + Send;

    fn inspect(&self, id: &str) -> impl Future<Output = anyhow::Result<UnitDetails>> + Send;

    /// Everything the unit wrote to stdout and stderr.
    fn logs(&self, id: &str) -> impl Future<Output = anyhow::Result<String>> + Send;

    fn remove(&self, id: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}
