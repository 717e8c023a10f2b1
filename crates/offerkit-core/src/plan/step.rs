//! Step status derivation from persisted task state.

use crate::domain::{
    ConfigId, GoalState, PodInstanceRequirement, Status, TaskInfo, TaskLabelError, TaskState,
    TaskStatus,
};
use crate::error::SchedulerResult;
use crate::ports::StateStore;

/// Status of one task's step contribution.
///
/// # Design
/// - no TaskInfo, or one launched for an older target configuration: PENDING
/// - TaskInfo without a status for its task id: PREPARED
/// - staging/starting/killing, or running a FINISHED-goal task: IN_PROGRESS
/// - running a RUNNING-goal task, or finished a FINISHED-goal task: COMPLETE
/// - failed/lost/error/killed, or finished a RUNNING-goal task: ERROR
pub fn task_status(
    goal: GoalState,
    info: Option<&TaskInfo>,
    status: Option<&TaskStatus>,
    target: ConfigId,
) -> Result<Status, TaskLabelError> {
    let Some(info) = info else {
        return Ok(Status::Pending);
    };
    if info.target_configuration()? != target {
        return Ok(Status::Pending);
    }
    let Some(status) = status.filter(|s| s.task_id == info.task_id) else {
        return Ok(Status::Prepared);
    };
    Ok(match (status.state, goal) {
        (TaskState::Staging | TaskState::Starting | TaskState::Killing, _) => Status::InProgress,
        (TaskState::Running, GoalState::Running) => Status::Complete,
        (TaskState::Running, GoalState::Finished) => Status::InProgress,
        (TaskState::Finished, GoalState::Finished) => Status::Complete,
        (TaskState::Finished, GoalState::Running) => Status::Error,
        (TaskState::Failed | TaskState::Killed | TaskState::Lost | TaskState::Error, _) => {
            Status::Error
        }
    })
}

/// Combines the statuses of a multi-task step: the least settled wins.
///
/// ERROR, then PENDING, then IN_PROGRESS, then PREPARED, else COMPLETE.
pub fn reduce_tasks<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    let rank = |s: Status| match s {
        Status::Error => 4,
        Status::Pending => 3,
        Status::InProgress => 2,
        Status::Prepared => 1,
        Status::Complete => 0,
    };
    statuses
        .into_iter()
        .max_by_key(|s| rank(*s))
        .unwrap_or(Status::Complete)
}

/// Status of a deploy step launching `requirement` under `target`.
pub fn deploy_step_status(
    requirement: &PodInstanceRequirement,
    target: ConfigId,
    state: &dyn StateStore,
) -> SchedulerResult<Status> {
    let instance = &requirement.pod_instance;
    let mut statuses = Vec::with_capacity(requirement.task_names.len());
    for short in &requirement.task_names {
        let Some(spec) = instance.pod.task(short) else {
            return Ok(Status::Error);
        };
        let name = instance.task_name(short);
        let info = state.fetch_task(&name)?;
        let status = state.fetch_status(&name)?;
        statuses.push(task_status(spec.goal, info.as_ref(), status.as_ref(), target)?);
    }
    Ok(reduce_tasks(statuses))
}
