//! FailureMonitor - decides when a failed task is gone for good.
//!
//! A permanently failed task is replaced (fresh reservations, possibly a
//! new host). Anything else is relaunched in place.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::domain::{PodSpec, TaskInfo};
use crate::ports::{Clock, ConfigStore};

/// # Implementations
/// - **DefaultFailureMonitor**: labeled failed, or the pod is not sticky
/// - **NeverFailureMonitor**: nothing is ever permanently failed
/// - **TimedFailureMonitor**: default, or failed for longer than a grace period
pub trait FailureMonitor: Send + Sync {
    fn has_failed(&self, task: &TaskInfo) -> bool;

    /// Called when `task_name` is launched again.
    fn forget(&self, _task_name: &str) {}
}

pub struct DefaultFailureMonitor {
    configs: Arc<dyn ConfigStore>,
}

impl DefaultFailureMonitor {
    pub fn new(configs: Arc<dyn ConfigStore>) -> Self {
        Self { configs }
    }

    /// Pod spec the task was launched from.
    fn pod_of(&self, task: &TaskInfo) -> Result<PodSpec, String> {
        let config = task.target_configuration().map_err(|e| e.to_string())?;
        let pod_type = task.pod_type().map_err(|e| e.to_string())?;
        let spec = self.configs.fetch(&config).map_err(|e| e.to_string())?;
        spec.pod(pod_type)
            .cloned()
            .ok_or_else(|| format!("configuration {config} has no pod type '{pod_type}'"))
    }

    /// Unresolvable pods count as sticky: wrongly replacing an instance
    /// would destroy its reservations and volumes.
    fn is_sticky(&self, task: &TaskInfo) -> bool {
        match self.pod_of(task) {
            Ok(pod) => pod.sticky,
            Err(reason) => {
                warn!(task = %task.name, %reason, "cannot resolve pod of task, treating it as sticky");
                true
            }
        }
    }
}

impl FailureMonitor for DefaultFailureMonitor {
    fn has_failed(&self, task: &TaskInfo) -> bool {
        task.is_permanently_failed() || !self.is_sticky(task)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFailureMonitor;

impl FailureMonitor for NeverFailureMonitor {
    fn has_failed(&self, _task: &TaskInfo) -> bool {
        false
    }
}

/// Also reports a task failed once it has been seen failing for longer
/// than `grace_ms`. The first sighting starts the timer.
pub struct TimedFailureMonitor {
    inner: DefaultFailureMonitor,
    clock: Arc<dyn Clock>,
    grace_ms: i64,
    first_seen: Mutex<HashMap<String, i64>>,
}

impl fmt::Debug for TimedFailureMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedFailureMonitor")
            .field("grace_ms", &self.grace_ms)
            .finish_non_exhaustive()
    }
}

impl TimedFailureMonitor {
    pub fn new(inner: DefaultFailureMonitor, clock: Arc<dyn Clock>, grace_ms: i64) -> Self {
        Self {
            inner,
            clock,
            grace_ms,
            first_seen: Mutex::new(HashMap::new()),
        }
    }
}

impl FailureMonitor for TimedFailureMonitor {
    fn has_failed(&self, task: &TaskInfo) -> bool {
        if self.inner.has_failed(task) {
            return true;
        }
        let now = self.clock.now_millis();
        let Ok(mut first_seen) = self.first_seen.lock() else {
            return false;
        };
        let since = *first_seen.entry(task.name.clone()).or_insert(now);
        now.saturating_sub(since) >= self.grace_ms
    }

    fn forget(&self, task_name: &str) {
        if let Ok(mut first_seen) = self.first_seen.lock() {
            first_seen.remove(task_name);
        }
    }
}
