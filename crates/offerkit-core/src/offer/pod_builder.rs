//! PodInfoBuilder - the in-progress launch description of one pod instance.
//!
//! Stages write resolved resources, ports, environment and discovery info
//! into it; the launch stage turns it into `TaskInfo`s. A fresh builder is
//! made for every (offer, pod) evaluation so a failed attempt leaves nothing
//! behind.

use std::sync::Arc;

use crate::domain::task::labels;
use crate::domain::{
    AgentId, CheckInfo, CheckSpec, CommandInfo, ConfigId, DiscoveryInfo, ExecutorId, ExecutorInfo,
    PodInstance, PodInstanceRequirement, RecoveryType, Resource, TaskInfo,
};
use crate::ports::IdGenerator;

use super::requirement::RequirementError;

/// Which part of the pod a stage writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTarget {
    /// Task by short name.
    Task(String),
    Executor,
}

pub struct PodInfoBuilder {
    pod_instance: PodInstance,
    recovery_type: RecoveryType,
    /// Short name and in-progress info, in requirement order.
    tasks: Vec<(String, TaskInfo)>,
    executor: Option<ExecutorInfo>,
    ids: Arc<dyn IdGenerator>,
}

impl PodInfoBuilder {
    /// `prior` holds the stored TaskInfos of this pod instance. Their
    /// discovery entries are carried over unless the pod is being replaced.
    /// `running_executor` is the executor to launch into when it is still up.
    pub fn new(
        requirement: &PodInstanceRequirement,
        target: ConfigId,
        prior: &[TaskInfo],
        running_executor: Option<&ExecutorInfo>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, RequirementError> {
        let instance = &requirement.pod_instance;
        let permanent = requirement.recovery_type == RecoveryType::Permanent;

        let mut tasks = Vec::with_capacity(requirement.task_names.len());
        for short in &requirement.task_names {
            let spec = instance.pod.task(short).ok_or_else(|| RequirementError::UnknownTask {
                pod: instance.name(),
                task: short.clone(),
            })?;
            let name = instance.task_name(short);
            let discovery = if permanent {
                None
            } else {
                prior
                    .iter()
                    .find(|t| t.name == name)
                    .and_then(|t| t.discovery.clone())
            };
            let mut info = TaskInfo {
                name,
                task_id: ids.task_id(),
                agent_id: AgentId::new(""),
                hostname: String::new(),
                resources: Vec::new(),
                command: CommandInfo {
                    value: spec.command.clone(),
                    env: spec.env.clone(),
                },
                health_check: spec.health_check.as_ref().map(check_info),
                readiness_check: spec.readiness_check.as_ref().map(check_info),
                discovery,
                executor: None,
                labels: Default::default(),
            };
            info.labels
                .insert(labels::GOAL_STATE.to_string(), spec.goal.as_str().to_string());
            info.labels
                .insert(labels::POD_TYPE.to_string(), instance.pod.pod_type.clone());
            info.labels
                .insert(labels::POD_INDEX.to_string(), instance.index.to_string());
            info.labels
                .insert(labels::TARGET_CONFIGURATION.to_string(), target.to_string());
            tasks.push((short.clone(), info));
        }

        let executor = instance.pod.executor.as_ref().map(|spec| match running_executor {
            Some(running) if !permanent => running.clone(),
            _ => ExecutorInfo {
                executor_id: ExecutorId::new(""),
                name: spec.name.clone(),
                command: CommandInfo {
                    value: spec.command.clone().unwrap_or_default(),
                    env: Default::default(),
                },
                resources: Vec::new(),
                discovery: None,
            },
        });

        Ok(Self {
            pod_instance: instance.clone(),
            recovery_type: requirement.recovery_type,
            tasks,
            executor,
            ids,
        })
    }

    pub fn pod_instance(&self) -> &PodInstance {
        &self.pod_instance
    }

    pub fn recovery_type(&self) -> RecoveryType {
        self.recovery_type
    }

    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    pub fn executor(&self) -> Option<&ExecutorInfo> {
        self.executor.as_ref()
    }

    pub fn executor_mut(&mut self) -> Option<&mut ExecutorInfo> {
        self.executor.as_mut()
    }

    pub fn task(&self, short: &str) -> Option<&TaskInfo> {
        self.tasks.iter().find(|(n, _)| n == short).map(|(_, t)| t)
    }

    pub fn task_mut(&mut self, short: &str) -> Option<&mut TaskInfo> {
        self.tasks.iter_mut().find(|(n, _)| n == short).map(|(_, t)| t)
    }

    /// Full name of the task or executor behind `target`.
    pub fn owner_name(&self, target: &BuildTarget) -> Option<String> {
        match target {
            BuildTarget::Task(short) => self.task(short).map(|t| t.name.clone()),
            BuildTarget::Executor => self.executor.as_ref().map(|e| e.name.clone()),
        }
    }

    pub fn add_resource(&mut self, target: &BuildTarget, resource: Resource) -> bool {
        match self.resources_mut(target) {
            Some(resources) => {
                resources.push(resource);
                true
            }
            None => false,
        }
    }

    fn resources_mut(&mut self, target: &BuildTarget) -> Option<&mut Vec<Resource>> {
        match target {
            BuildTarget::Task(short) => self.task_mut(short).map(|t| &mut t.resources),
            BuildTarget::Executor => self.executor.as_mut().map(|e| &mut e.resources),
        }
    }

    /// Sets `key=value` in the command environment and, for tasks, in the
    /// health and readiness check environments when those checks exist.
    pub fn set_env(&mut self, target: &BuildTarget, key: &str, value: &str) {
        match target {
            BuildTarget::Task(short) => {
                let Some(task) = self.task_mut(short) else {
                    return;
                };
                task.command.env.insert(key.to_string(), value.to_string());
                for check in [&mut task.health_check, &mut task.readiness_check]
                    .into_iter()
                    .flatten()
                {
                    check.command.env.insert(key.to_string(), value.to_string());
                }
            }
            BuildTarget::Executor => {
                if let Some(executor) = self.executor.as_mut() {
                    executor.command.env.insert(key.to_string(), value.to_string());
                }
            }
        }
    }

    pub fn discovery_mut(&mut self, target: &BuildTarget) -> Option<&mut Option<DiscoveryInfo>> {
        match target {
            BuildTarget::Task(short) => self.task_mut(short).map(|t| &mut t.discovery),
            BuildTarget::Executor => self.executor.as_mut().map(|e| &mut e.discovery),
        }
    }

    /// Final TaskInfos, placed on the offer's agent.
    pub fn build_tasks(&self, agent_id: &AgentId, hostname: &str) -> Vec<TaskInfo> {
        self.tasks
            .iter()
            .map(|(_, t)| {
                let mut task = t.clone();
                task.agent_id = agent_id.clone();
                task.hostname = hostname.to_string();
                task.executor = self.executor.clone();
                task
            })
            .collect()
    }
}

fn check_info(spec: &CheckSpec) -> CheckInfo {
    CheckInfo {
        command: CommandInfo {
            value: spec.command.clone(),
            env: Default::default(),
        },
        interval_secs: spec.interval_secs,
    }
}
