//! Status view - what the scheduler is doing, as plain serializable data.

use serde::{Deserialize, Serialize};

use crate::domain::{ConfigId, TaskState};
use crate::plan::PlanSnapshot;
use crate::ports::{StateResult, StateStore};
use crate::recovery::RecoveryStepView;

/// Stored tasks by the state of their current attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    /// Launched, no status for this attempt yet.
    pub launched: usize,
    pub starting: usize,
    pub running: usize,
    pub killing: usize,
    pub finished: usize,
    pub failed: usize,
    /// Labeled for replacement.
    pub permanently_failed: usize,
}

impl TaskCounts {
    pub fn collect(state: &dyn StateStore) -> StateResult<Self> {
        let mut counts = TaskCounts::default();
        for task in state.fetch_tasks()? {
            if task.is_permanently_failed() {
                counts.permanently_failed += 1;
            }
            let current = state
                .fetch_status(&task.name)?
                .filter(|s| s.task_id == task.task_id);
            match current.map(|s| s.state) {
                None => counts.launched += 1,
                Some(TaskState::Staging | TaskState::Starting) => counts.starting += 1,
                Some(TaskState::Running) => counts.running += 1,
                Some(TaskState::Killing) => counts.killing += 1,
                Some(TaskState::Finished) => counts.finished += 1,
                Some(_) => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub service: String,
    pub target_configuration: ConfigId,
    pub reconciled: bool,
    pub deploy: PlanSnapshot,
    pub recovery: Vec<RecoveryStepView>,
    pub tasks: TaskCounts,
}

impl SchedulerStatus {
    /// Deploy plan complete and nothing waiting for recovery.
    pub fn is_settled(&self) -> bool {
        self.deploy.is_complete() && self.recovery.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::labels;
    use crate::domain::{AgentId, TaskId, TaskInfo, TaskStatus};
    use crate::impls::InMemoryStateStore;
    use ulid::Ulid;

    fn task(name: &str) -> TaskInfo {
        TaskInfo {
            name: name.to_string(),
            task_id: TaskId::from_ulid(Ulid::new()),
            agent_id: AgentId::new("a"),
            hostname: "h".to_string(),
            resources: Vec::new(),
            command: Default::default(),
            health_check: None,
            readiness_check: None,
            discovery: None,
            executor: None,
            labels: Default::default(),
        }
    }

    #[test]
    fn counts_only_the_current_attempt() {
        let state = InMemoryStateStore::new();
        let running = task("node-0-server");
        let mut failed = task("node-1-server");
        failed.mark_permanently_failed();
        let relaunched = task("node-2-server");
        state
            .store_tasks(&[running.clone(), failed.clone(), relaunched.clone()])
            .unwrap();
        state
            .store_status(&running.name, &TaskStatus::new(running.task_id, TaskState::Running))
            .unwrap();
        state
            .store_status(&failed.name, &TaskStatus::new(failed.task_id, TaskState::Lost))
            .unwrap();
        // status of an earlier attempt
        state
            .store_status(
                &relaunched.name,
                &TaskStatus::new(TaskId::from_ulid(Ulid::new()), TaskState::Failed),
            )
            .unwrap();

        let counts = TaskCounts::collect(&state).unwrap();
        assert_eq!(
            counts,
            TaskCounts {
                launched: 1,
                running: 1,
                failed: 1,
                permanently_failed: 1,
                ..Default::default()
            }
        );
        assert!(failed.labels.contains_key(labels::PERMANENTLY_FAILED));
    }
}
