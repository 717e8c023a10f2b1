//! Declarative service model (ServiceSpec / PodSpec / TaskSpec).
//!
//! These types are produced by an external spec loader and are immutable for
//! a given configuration version. Parsing a product's YAML is not our job;
//! we only validate the typed model before building plans from it.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::resource::{CPUS, DISK, MEM, PORTS};

/// Highest valid port number.
pub const MAX_PORT: u64 = 65535;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_principal")]
    pub principal: String,
    pub pods: Vec<PodSpec>,
}

fn default_role() -> String {
    "offerkit-role".to_string()
}

fn default_principal() -> String {
    "offerkit-principal".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    /// Pod type, e.g. `"node"`. Instances are named `"{pod_type}-{index}"`.
    pub pod_type: String,
    pub count: u32,
    /// Sticky pods keep their reservations across relaunches.
    #[serde(default = "default_sticky")]
    pub sticky: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorSpec>,
    pub tasks: Vec<TaskSpec>,
}

fn default_sticky() -> bool {
    true
}

/// Built-in placement constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PlacementSpec {
    /// Offers from `avoid` hostnames are rejected; when `require` is non-empty
    /// only those hostnames are accepted.
    Hostname {
        #[serde(default)]
        avoid: Vec<String>,
        #[serde(default)]
        require: Vec<String>,
    },
    /// At most `max` tasks of this pod type per hostname.
    MaxPerHostname { max: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSpec {
    pub name: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalState {
    /// Long-running task; complete once running.
    Running,
    /// One-shot command; complete once finished successfully.
    Finished,
}

impl GoalState {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalState::Running => "RUNNING",
            GoalState::Finished => "FINISHED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RUNNING" => Some(GoalState::Running),
            "FINISHED" => Some(GoalState::Finished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default = "default_goal")]
    pub goal: GoalState,
    pub command: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<CheckSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_check: Option<CheckSpec>,
}

fn default_goal() -> GoalState {
    GoalState::Running
}

impl TaskSpec {
    /// Convenience constructor for tests and demos.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            goal: GoalState::Running,
            command: command.into(),
            env: BTreeMap::new(),
            resources: Vec::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            health_check: None,
            readiness_check: None,
        }
    }

    pub fn with_resource(mut self, name: &str, amount: f64) -> Self {
        self.resources.push(ResourceSpec::new(name, amount));
        self
    }

    pub fn with_port(mut self, port: PortSpec) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_goal(mut self, goal: GoalState) -> Self {
        self.goal = goal;
        self
    }
}

/// Scalar resource requirement (cpus, mem, disk).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    pub amount: f64,
}

impl ResourceSpec {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    /// Requested port; `0` asks for any free port.
    #[serde(default)]
    pub port: u64,
    /// Environment variable to expose the port under (default `PORT_{name}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip: Option<VipSpec>,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, port: u64) -> Self {
        Self {
            name: name.into(),
            port,
            env_key: None,
            vip: None,
        }
    }

    pub fn with_env_key(mut self, key: impl Into<String>) -> Self {
        self.env_key = Some(key.into());
        self
    }

    pub fn with_vip(mut self, vip: VipSpec) -> Self {
        self.vip = Some(vip);
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.port == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipSpec {
    pub name: String,
    pub port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise: Option<bool>,
}

/// Persistent ROOT volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub container_path: String,
    pub size_mb: f64,
}

/// Health or readiness check command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub command: String,
    #[serde(default = "default_check_interval")]
    pub interval_secs: u32,
}

fn default_check_interval() -> u32 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid service spec: {0}")]
pub struct SpecValidationError(pub String);

impl ServiceSpec {
    pub fn pod(&self, pod_type: &str) -> Option<&PodSpec> {
        self.pods.iter().find(|p| p.pod_type == pod_type)
    }

    /// Validates the typed model. A failure here is a fatal configuration
    /// error: no plan may be built from this spec.
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.name.is_empty() {
            return Err(SpecValidationError("service name is empty".to_string()));
        }
        let mut pod_types = HashSet::new();
        for pod in &self.pods {
            if !pod_types.insert(pod.pod_type.as_str()) {
                return Err(SpecValidationError(format!(
                    "duplicate pod type '{}'",
                    pod.pod_type
                )));
            }
            pod.validate()?;
        }
        Ok(())
    }
}

impl PodSpec {
    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name.clone()).collect()
    }

    pub fn validate(&self) -> Result<(), SpecValidationError> {
        let fail = |msg: String| Err(SpecValidationError(format!("pod '{}': {msg}", self.pod_type)));
        if self.pod_type.is_empty() {
            return fail("pod type is empty".to_string());
        }
        if self.tasks.is_empty() {
            return fail("no tasks declared".to_string());
        }
        if let Some(executor) = &self.executor {
            if executor.name.is_empty() {
                return fail("executor name is empty".to_string());
            }
            validate_scalars(&executor.resources).map_err(|e| {
                SpecValidationError(format!("pod '{}' executor: {}", self.pod_type, e.0))
            })?;
        }
        let mut task_names = HashSet::new();
        // Fixed ports must be unique across the pod: all tasks share an agent.
        let mut fixed_ports = HashSet::new();
        for task in &self.tasks {
            if !task_names.insert(task.name.as_str()) {
                return fail(format!("duplicate task '{}'", task.name));
            }
            validate_scalars(&task.resources).map_err(|e| {
                SpecValidationError(format!("pod '{}' task '{}': {}", self.pod_type, task.name, e.0))
            })?;
            let mut port_names = HashSet::new();
            for port in &task.ports {
                if !port_names.insert(port.name.as_str()) {
                    return fail(format!("task '{}': duplicate port '{}'", task.name, port.name));
                }
                if port.port > MAX_PORT {
                    return fail(format!("task '{}': port {} out of range", task.name, port.port));
                }
                if !port.is_dynamic() && !fixed_ports.insert(port.port) {
                    return fail(format!("port {} requested twice", port.port));
                }
            }
            for volume in &task.volumes {
                if volume.size_mb <= 0.0 || volume.container_path.is_empty() {
                    return fail(format!("task '{}': invalid volume", task.name));
                }
            }
        }
        Ok(())
    }
}

fn validate_scalars(resources: &[ResourceSpec]) -> Result<(), SpecValidationError> {
    let mut names = HashSet::new();
    for r in resources {
        if ![CPUS, MEM, DISK].contains(&r.name.as_str()) {
            let reason = if r.name == PORTS {
                "ports must be declared as port specs".to_string()
            } else {
                format!("unknown scalar resource '{}'", r.name)
            };
            return Err(SpecValidationError(reason));
        }
        if !r.amount.is_finite() || r.amount <= 0.0 {
            return Err(SpecValidationError(format!(
                "resource '{}' must be positive, got {}",
                r.name, r.amount
            )));
        }
        if !names.insert(r.name.as_str()) {
            return Err(SpecValidationError(format!("duplicate resource '{}'", r.name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod() -> PodSpec {
        PodSpec {
            pod_type: "node".to_string(),
            count: 3,
            sticky: true,
            placement: None,
            executor: None,
            tasks: vec![
                TaskSpec::new("server", "./server")
                    .with_resource(CPUS, 1.0)
                    .with_resource(MEM, 512.0)
                    .with_port(PortSpec::new("http", 0)),
            ],
        }
    }

    #[test]
    fn valid_pod_passes() {
        assert!(pod().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_resources() {
        let mut p = pod();
        p.tasks[0].resources[0].amount = 0.0;
        let err = p.validate().unwrap_err();
        assert!(err.0.contains("must be positive"));
    }

    #[test]
    fn rejects_duplicate_fixed_ports_across_tasks() {
        let mut p = pod();
        p.tasks[0].ports = vec![PortSpec::new("a", 8080)];
        p.tasks.push(TaskSpec::new("sidecar", "./sidecar").with_port(PortSpec::new("b", 8080)));
        assert!(p.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_pod_types() {
        let spec = ServiceSpec {
            name: "svc".to_string(),
            role: default_role(),
            principal: default_principal(),
            pods: vec![pod(), pod()],
        };
        assert!(spec.validate().unwrap_err().0.contains("duplicate pod type"));
    }

    #[test]
    fn service_spec_defaults_from_json() {
        let json = r#"
        {
          "name": "hello",
          "pods": [
            { "pod_type": "hello", "count": 1,
              "tasks": [ { "name": "server", "command": "sleep 1000" } ] }
          ]
        }"#;
        let spec: ServiceSpec = serde_json::from_str(json).expect("deserialize");
        assert_eq!(spec.role, "offerkit-role");
        assert!(spec.pods[0].sticky);
        assert_eq!(spec.pods[0].tasks[0].goal, GoalState::Running);
    }
}
