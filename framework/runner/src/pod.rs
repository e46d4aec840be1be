use crate::config::HangarConfig;
use anyhow::Context;
use hangar_run_model::{dns_subdomain, label_value};
use serde::Serialize;
use std::collections::BTreeMap;

/// Label carrying the run id on every pod.
pub const POD_RUN_LABEL: &str = "hangar/run";
/// Label carrying the scenario name on every pod, shortened to fit a label value.
pub const POD_SCENARIO_LABEL: &str = "hangar/scenario";
/// Annotation carrying the full scenario name on every pod.
pub const POD_SCENARIO_ANNOTATION: &str = "hangar/scenario";

/// A pod that runs one scenario to completion, exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodDescriptor {
    pub api_version: String,
    pub kind: String,
    pub metadata: PodMetadata,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodMetadata {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub restart_policy: String,
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    pub args: Vec<String>,
    pub env: Vec<EnvVar>,
    pub resources: Resources,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resources {
    pub requests: ResourceAmounts,
    pub limits: ResourceAmounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceAmounts {
    pub cpu: String,
    pub memory: String,
}

impl PodDescriptor {
    pub fn for_scenario(config: &HangarConfig, scenario: &str, total_scenarios: usize) -> Self {
        let namespace = config.run.namespace();
        let labels = BTreeMap::from([
            (POD_RUN_LABEL.to_string(), namespace.clone()),
            (POD_SCENARIO_LABEL.to_string(), label_value(scenario)),
        ]);
        let annotations =
            BTreeMap::from([(POD_SCENARIO_ANNOTATION.to_string(), scenario.to_string())]);

        let env = config
            .unit_env(total_scenarios)
            .into_iter()
            .map(|(name, value)| EnvVar { name, value })
            .collect();

        let resources = &config.resources;

        Self {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            metadata: PodMetadata {
                name: dns_subdomain(&config.run.unit_name(scenario)),
                namespace,
                labels,
                annotations,
            },
            spec: PodSpec {
                restart_policy: "Never".to_string(),
                containers: vec![Container {
                    name: "scenario".to_string(),
                    image: config.image.clone(),
                    args: vec![scenario.to_string()],
                    env,
                    resources: Resources {
                        requests: ResourceAmounts {
                            cpu: resources.cpu.clone(),
                            memory: resources.memory_request.clone(),
                        },
                        limits: ResourceAmounts {
                            cpu: resources.cpu.clone(),
                            memory: resources.memory_limit.clone(),
                        },
                    },
                }],
            },
        }
    }

    pub fn scenario(&self) -> &str {
        self.metadata
            .annotations
            .get(POD_SCENARIO_ANNOTATION)
            .map(String::as_str)
            .unwrap_or(&self.metadata.name)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self)
            .with_context(|| format!("Failed to render pod {}", self.metadata.name))
    }
}
