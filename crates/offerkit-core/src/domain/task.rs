//! Launched task state: `TaskInfo` (what we asked the cluster to run) and
//! `TaskStatus` (what the cluster reported back).
//!
//! Both are persisted in the `StateStore` and are the only inputs, together
//! with the `ServiceSpec`, from which plan statuses are derived.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{AgentId, ConfigId, ExecutorId, TaskId};
use super::resource::Resource;
use super::spec::GoalState;

/// Label keys written onto every launched task.
pub mod labels {
    pub const GOAL_STATE: &str = "goal_state";
    pub const POD_TYPE: &str = "pod_type";
    pub const POD_INDEX: &str = "pod_index";
    pub const TARGET_CONFIGURATION: &str = "target_configuration";
    pub const PERMANENTLY_FAILED: &str = "permanently_failed";
}

pub type Environment = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandInfo {
    pub value: String,
    #[serde(default)]
    pub env: Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInfo {
    pub command: CommandInfo,
    pub interval_secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Framework,
    Cluster,
    External,
}

/// One advertised port in a task's discovery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryPort {
    pub number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    pub name: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub ports: Vec<DiscoveryPort>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorInfo {
    /// Empty until the executor stage assigns one.
    pub executor_id: ExecutorId,
    pub name: String,
    #[serde(default)]
    pub command: CommandInfo,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryInfo>,
}

/// Launch description of one task, persisted under its full name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Full task name, `"{pod_type}-{index}-{task}"`.
    pub name: String,
    pub task_id: TaskId,
    pub agent_id: AgentId,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    pub command: CommandInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<CheckInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_check: Option<CheckInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorInfo>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskLabelError {
    #[error("task {task} is missing label '{label}'")]
    Missing { task: String, label: &'static str },

    #[error("task {task} has invalid label '{label}': {value}")]
    Invalid {
        task: String,
        label: &'static str,
        value: String,
    },
}

impl TaskInfo {
    fn label(&self, key: &'static str) -> Result<&str, TaskLabelError> {
        self.labels
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| TaskLabelError::Missing {
                task: self.name.clone(),
                label: key,
            })
    }

    fn invalid(&self, key: &'static str, value: &str) -> TaskLabelError {
        TaskLabelError::Invalid {
            task: self.name.clone(),
            label: key,
            value: value.to_string(),
        }
    }

    pub fn goal_state(&self) -> Result<GoalState, TaskLabelError> {
        let raw = self.label(labels::GOAL_STATE)?;
        GoalState::parse(raw).ok_or_else(|| self.invalid(labels::GOAL_STATE, raw))
    }

    pub fn pod_type(&self) -> Result<&str, TaskLabelError> {
        self.label(labels::POD_TYPE)
    }

    pub fn pod_index(&self) -> Result<u32, TaskLabelError> {
        let raw = self.label(labels::POD_INDEX)?;
        raw.parse().map_err(|_| self.invalid(labels::POD_INDEX, raw))
    }

    pub fn target_configuration(&self) -> Result<ConfigId, TaskLabelError> {
        let raw = self.label(labels::TARGET_CONFIGURATION)?;
        raw.parse()
            .map_err(|_| self.invalid(labels::TARGET_CONFIGURATION, raw))
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.labels
            .get(labels::PERMANENTLY_FAILED)
            .is_some_and(|v| v == "true")
    }

    pub fn mark_permanently_failed(&mut self) {
        self.labels
            .insert(labels::PERMANENTLY_FAILED.to_string(), "true".to_string());
    }

    /// All resources backing this task, including its executor's.
    pub fn all_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources
            .iter()
            .chain(self.executor.iter().flat_map(|e| e.resources.iter()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Killing,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Finished
                | TaskState::Failed
                | TaskState::Killed
                | TaskState::Lost
                | TaskState::Error
        )
    }

    /// Terminal and not a successful finish.
    pub fn is_failure(self) -> bool {
        self.is_terminal() && self != TaskState::Finished
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,
    #[serde(default)]
    pub message: String,
}

impl TaskStatus {
    pub fn new(task_id: TaskId, state: TaskState) -> Self {
        Self {
            task_id,
            state,
            message: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ulid::Ulid;

    fn info() -> TaskInfo {
        TaskInfo {
            name: "node-0-server".to_string(),
            task_id: TaskId::from_ulid(Ulid::new()),
            agent_id: AgentId::new("agent-1"),
            hostname: "host-1".to_string(),
            resources: Vec::new(),
            command: CommandInfo::default(),
            health_check: None,
            readiness_check: None,
            discovery: None,
            executor: None,
            labels: BTreeMap::new(),
        }
    }

    #[test]
    fn typed_label_accessors() {
        let mut task = info();
        let config = ConfigId::from_ulid(Ulid::new());
        task.labels.insert(labels::GOAL_STATE.into(), "FINISHED".into());
        task.labels.insert(labels::POD_TYPE.into(), "node".into());
        task.labels.insert(labels::POD_INDEX.into(), "0".into());
        task.labels
            .insert(labels::TARGET_CONFIGURATION.into(), config.to_string());

        assert_eq!(task.goal_state().unwrap(), GoalState::Finished);
        assert_eq!(task.pod_type().unwrap(), "node");
        assert_eq!(task.pod_index().unwrap(), 0);
        assert_eq!(task.target_configuration().unwrap(), config);
        assert!(!task.is_permanently_failed());

        task.mark_permanently_failed();
        assert!(task.is_permanently_failed());
    }

    #[test]
    fn missing_and_invalid_labels_are_typed_errors() {
        let mut task = info();
        assert!(matches!(
            task.pod_index(),
            Err(TaskLabelError::Missing { label: "pod_index", .. })
        ));
        task.labels.insert(labels::POD_INDEX.into(), "zero".into());
        assert!(matches!(
            task.pod_index(),
            Err(TaskLabelError::Invalid { .. })
        ));
    }

    #[rstest]
    #[case::running(TaskState::Running, false, false)]
    #[case::finished(TaskState::Finished, true, false)]
    #[case::failed(TaskState::Failed, true, true)]
    #[case::lost(TaskState::Lost, true, true)]
    #[case::killing(TaskState::Killing, false, false)]
    fn task_state_classification(
        #[case] state: TaskState,
        #[case] terminal: bool,
        #[case] failure: bool,
    ) {
        assert_eq!(state.is_terminal(), terminal);
        assert_eq!(state.is_failure(), failure);
    }
}
