mod catalog;
mod cli;
mod cluster;
mod command;
mod config;
mod docker;
mod engine;
mod kubectl;
mod local;
mod monitor;
mod pod;
mod progress;
mod results;
mod run;
mod scheduler;
mod shutdown;

#[cfg(any(test, feature = "fakes"))]
pub mod fakes;

pub mod prelude {
    pub use crate::catalog::{filter_skipped, parse_skip_list, CatalogError, ScenarioCatalog};
    pub use crate::cli::{
        required_scenario_name, HangarCli, HangarCommand, ProgressArgs, ProgressFormat,
        UsageError,
    };
    pub use crate::cluster::ClusterDispatcher;
    pub use crate::command::CommandError;
    pub use crate::config::{HangarConfig, PodResources, PollIntervals};
    pub use crate::docker::DockerCli;
    pub use crate::engine::{
        ContainerEngine, LaunchRequest, UnitDetails, UnitState, UnitStatus, RUN_LABEL,
        SCENARIO_LABEL,
    };
    pub use crate::kubectl::KubectlCli;
    pub use crate::local::{DispatchSummary, LocalDispatcher};
    pub use crate::monitor::available_cores;
    pub use crate::pod::{
        PodDescriptor, POD_RUN_LABEL, POD_SCENARIO_ANNOTATION, POD_SCENARIO_LABEL,
    };
    pub use crate::progress::{
        ObserveUnits, Observation, ProgressError, ProgressSnapshot, ProgressTracker,
        PROGRESS_MEASUREMENT,
    };
    pub use crate::results::executions_table;
    pub use crate::run::run;
    pub use crate::scheduler::{ClusterError, ClusterScheduler, PodPhase, PodStatus};
}
