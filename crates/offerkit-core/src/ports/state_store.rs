//! StateStore / ConfigStore ports - the scheduler's store of record.
//!
//! Every plan status is re-derived from what is stored here, so writes must
//! be committed before the next scheduling pass reads them.
//!
//! # Implementations
//! - **InMemoryStateStore / InMemoryConfigStore** (`impls::memory_store`)

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::{ConfigId, ServiceSpec, TaskId, TaskInfo, TaskStatus};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state store lock poisoned: {0}")]
    Poisoned(String),

    #[error("failed to (de)serialize property '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown configuration {0}")]
    UnknownConfig(ConfigId),

    #[error("storage failure: {0}")]
    Storage(String),
}

pub type StateResult<T> = Result<T, StateError>;

/// Persisted task state, keyed by full task name.
///
/// # Design
/// - `&self` methods; implementations use interior mutability
/// - statuses are stored under the task name, not the task id, so a relaunch
///   (new task id) replaces the previous attempt's status
pub trait StateStore: Send + Sync {
    fn store_tasks(&self, tasks: &[TaskInfo]) -> StateResult<()>;

    fn fetch_task(&self, name: &str) -> StateResult<Option<TaskInfo>>;

    fn fetch_tasks(&self) -> StateResult<Vec<TaskInfo>>;

    fn store_status(&self, name: &str, status: &TaskStatus) -> StateResult<()>;

    fn fetch_status(&self, name: &str) -> StateResult<Option<TaskStatus>>;

    fn fetch_statuses(&self) -> StateResult<Vec<TaskStatus>>;

    /// Removes both the TaskInfo and the status of `name`.
    fn clear_task(&self, name: &str) -> StateResult<()>;

    fn store_property(&self, key: &str, value: Vec<u8>) -> StateResult<()>;

    fn fetch_property(&self, key: &str) -> StateResult<Option<Vec<u8>>>;

    fn fetch_task_by_id(&self, task_id: &TaskId) -> StateResult<Option<TaskInfo>> {
        Ok(self
            .fetch_tasks()?
            .into_iter()
            .find(|t| &t.task_id == task_id))
    }
}

/// Reads a JSON-encoded property.
pub fn fetch_json_property<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> StateResult<Option<T>> {
    let Some(bytes) = store.fetch_property(key)? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StateError::Serialization {
            key: key.to_string(),
            source,
        })
}

/// Writes a JSON-encoded property.
pub fn store_json_property<T: Serialize>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> StateResult<()> {
    let bytes = serde_json::to_vec(value).map_err(|source| StateError::Serialization {
        key: key.to_string(),
        source,
    })?;
    store.store_property(key, bytes)
}

/// Versioned service configurations plus the current target version.
pub trait ConfigStore: Send + Sync {
    fn store(&self, spec: &ServiceSpec) -> StateResult<ConfigId>;

    fn fetch(&self, id: &ConfigId) -> StateResult<ServiceSpec>;

    fn list(&self) -> StateResult<Vec<ConfigId>>;

    fn set_target(&self, id: ConfigId) -> StateResult<()>;

    fn target(&self) -> StateResult<Option<ConfigId>>;
}
