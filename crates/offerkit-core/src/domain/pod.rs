//! Pod instances and launch requirements.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::spec::PodSpec;

/// Why a launch is being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryType {
    /// Regular deployment.
    None,
    /// Relaunch in place, reusing reservations.
    Transient,
    /// Replace the instance; prior reservations are abandoned.
    Permanent,
}

/// One replica of a pod type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodInstance {
    pub pod: PodSpec,
    pub index: u32,
}

impl PodInstance {
    pub fn new(pod: PodSpec, index: u32) -> Self {
        Self { pod, index }
    }

    /// `"{pod_type}-{index}"`. Key for launch history and placement.
    pub fn name(&self) -> String {
        Self::instance_name(&self.pod.pod_type, self.index)
    }

    pub fn instance_name(pod_type: &str, index: u32) -> String {
        format!("{pod_type}-{index}")
    }

    /// `"{pod_type}-{index}-{task}"`, the key a task is persisted under.
    pub fn task_name(&self, task: &str) -> String {
        format!("{}-{task}", self.name())
    }

    pub fn task_names(&self) -> Vec<String> {
        self.pod.tasks.iter().map(|t| self.task_name(&t.name)).collect()
    }
}

impl fmt::Display for PodInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pod.pod_type, self.index)
    }
}

/// What one step asks of an offer: launch `task_names` of one pod instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodInstanceRequirement {
    pub pod_instance: PodInstance,
    /// Short task names (as declared in the pod spec).
    pub task_names: Vec<String>,
    pub recovery_type: RecoveryType,
}

impl PodInstanceRequirement {
    pub fn new(pod_instance: PodInstance, task_names: Vec<String>) -> Self {
        Self {
            pod_instance,
            task_names,
            recovery_type: RecoveryType::None,
        }
    }

    /// Requirement launching every task in the pod.
    pub fn all_tasks(pod_instance: PodInstance) -> Self {
        let task_names = pod_instance.pod.task_names();
        Self::new(pod_instance, task_names)
    }

    pub fn with_recovery(mut self, recovery_type: RecoveryType) -> Self {
        self.recovery_type = recovery_type;
        self
    }

    /// Full names of the tasks this requirement launches.
    pub fn full_task_names(&self) -> Vec<String> {
        self.task_names
            .iter()
            .map(|t| self.pod_instance.task_name(t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::spec::TaskSpec;

    #[test]
    fn names_follow_pod_and_index() {
        let pod = PodSpec {
            pod_type: "journal".to_string(),
            count: 3,
            sticky: true,
            placement: None,
            executor: None,
            tasks: vec![TaskSpec::new("node", "./run"), TaskSpec::new("init", "./init")],
        };
        let instance = PodInstance::new(pod, 2);
        assert_eq!(instance.name(), "journal-2");
        assert_eq!(instance.to_string(), "journal-2");
        assert_eq!(instance.task_name("node"), "journal-2-node");

        let req = PodInstanceRequirement::all_tasks(instance);
        assert_eq!(req.full_task_names(), vec!["journal-2-node", "journal-2-init"]);
        assert_eq!(req.recovery_type, RecoveryType::None);
    }
}
