//! Recovery plan: relaunches of pod instances whose tasks failed.
//!
//! Recovery steps live outside the deploy plan and are recomputed every
//! pass from persisted task state, like the deploy plan's statuses.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::domain::{
    GoalState, OfferRecommendation, PodInstance, PodInstanceRequirement, RecoveryType,
    ServiceSpec, TaskInfo, TaskLabelError, TaskState, TaskStatus,
};
use crate::error::SchedulerResult;
use crate::ports::{StateResult, StateStore};

use super::constrainer::LaunchConstrainer;
use super::monitor::FailureMonitor;

/// One pod instance waiting to be relaunched.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryStep {
    pub requirement: PodInstanceRequirement,
    /// False while the launch constrainer holds it back.
    pub permitted: bool,
}

impl RecoveryStep {
    pub fn name(&self) -> String {
        self.requirement.pod_instance.name()
    }
}

/// Serializable view of a recovery step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryStepView {
    pub name: String,
    pub recovery_type: RecoveryType,
    pub tasks: Vec<String>,
    pub permitted: bool,
}

impl From<&RecoveryStep> for RecoveryStepView {
    fn from(step: &RecoveryStep) -> Self {
        Self {
            name: step.name(),
            recovery_type: step.requirement.recovery_type,
            tasks: step.requirement.full_task_names(),
            permitted: step.permitted,
        }
    }
}

pub struct RecoveryPlanManager {
    state: Arc<dyn StateStore>,
    monitor: Arc<dyn FailureMonitor>,
    constrainer: Arc<dyn LaunchConstrainer>,
}

/// A stored task whose current attempt needs a relaunch: it failed, or a
/// long-running task exited.
fn needs_recovery(task: &TaskInfo, status: &TaskStatus) -> Result<bool, TaskLabelError> {
    if status.task_id != task.task_id {
        return Ok(false);
    }
    Ok(match status.state {
        TaskState::Failed | TaskState::Killed | TaskState::Lost | TaskState::Error => true,
        TaskState::Finished => task.goal_state()? == GoalState::Running,
        _ => false,
    })
}

/// Pod instance (type, index) of a task that needs a relaunch.
fn recovery_key(task: &TaskInfo, status: &TaskStatus) -> Result<Option<(String, u32)>, TaskLabelError> {
    if !needs_recovery(task, status)? {
        return Ok(None);
    }
    Ok(Some((task.pod_type()?.to_string(), task.pod_index()?)))
}

impl RecoveryPlanManager {
    pub fn new(
        state: Arc<dyn StateStore>,
        monitor: Arc<dyn FailureMonitor>,
        constrainer: Arc<dyn LaunchConstrainer>,
    ) -> Self {
        Self {
            state,
            monitor,
            constrainer,
        }
    }

    /// Recovery steps for this pass.
    ///
    /// # Design
    /// - failed tasks are grouped by pod instance; instances in `dirty` (the
    ///   deploy plan is still working on them) are left alone
    /// - PERMANENT if the failure monitor gives up on any failed task of the
    ///   instance, relaunching the whole pod; else TRANSIENT, relaunching
    ///   only the failed tasks
    /// - pods no longer in `spec` (or instances past its count) are skipped
    /// - a task with corrupt labels is logged and skipped; other pods still
    ///   recover
    pub fn steps(
        &self,
        spec: &ServiceSpec,
        dirty: &BTreeSet<String>,
    ) -> SchedulerResult<Vec<RecoveryStep>> {
        let mut failed: BTreeMap<(String, u32), Vec<TaskInfo>> = BTreeMap::new();
        for task in self.state.fetch_tasks()? {
            let Some(status) = self.state.fetch_status(&task.name)? else {
                continue;
            };
            match recovery_key(&task, &status) {
                Ok(Some(key)) => failed.entry(key).or_default().push(task),
                Ok(None) => {}
                Err(e) => error!(task = %task.name, error = %e, "corrupt task labels, not recovering"),
            }
        }

        let mut steps = Vec::new();
        for ((pod_type, index), tasks) in failed {
            let name = PodInstance::instance_name(&pod_type, index);
            if dirty.contains(&name) {
                debug!(pod = %name, "deploy plan owns failed pod instance");
                continue;
            }
            let Some(pod) = spec.pod(&pod_type).filter(|p| index < p.count) else {
                debug!(pod = %name, "failed pod instance is no longer declared");
                continue;
            };
            let instance = PodInstance::new(pod.clone(), index);
            let prefix = format!("{name}-");

            let permanent = tasks.iter().any(|t| self.monitor.has_failed(t));
            let requirement = if permanent {
                PodInstanceRequirement::all_tasks(instance).with_recovery(RecoveryType::Permanent)
            } else {
                let names: Vec<String> = tasks
                    .iter()
                    .filter_map(|t| t.name.strip_prefix(&prefix))
                    .filter(|short| pod.task(short).is_some())
                    .map(str::to_string)
                    .collect();
                if names.is_empty() {
                    continue;
                }
                PodInstanceRequirement::new(instance, names).with_recovery(RecoveryType::Transient)
            };

            let permitted = self
                .constrainer
                .can_launch(&requirement.pod_instance, requirement.recovery_type);
            if !permitted {
                debug!(pod = %name, "recovery held back by launch constrainer");
            }
            steps.push(RecoveryStep {
                requirement,
                permitted,
            });
        }
        Ok(steps)
    }

    /// Records an accepted launch of `requirement`.
    pub fn launched(
        &self,
        requirement: &PodInstanceRequirement,
        recommendations: &[OfferRecommendation],
    ) -> StateResult<()> {
        for rec in recommendations {
            self.constrainer.launch_happened(
                &requirement.pod_instance,
                &rec.operation,
                requirement.recovery_type,
            )?;
            for task in rec.launched_tasks() {
                self.monitor.forget(&task.name);
            }
        }
        Ok(())
    }
}
