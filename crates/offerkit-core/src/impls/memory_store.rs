//! In-memory StateStore / ConfigStore.
//!
//! # Implementation
//! - one `Mutex` per store; no lock is held across calls
//! - a poisoned lock surfaces as `StateError::Poisoned` instead of panicking

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::{ConfigId, ServiceSpec, TaskInfo, TaskStatus};
use crate::ports::{ConfigStore, IdGenerator, StateError, StateResult, StateStore};

fn lock<T>(m: &Mutex<T>) -> StateResult<MutexGuard<'_, T>> {
    m.lock().map_err(|e| StateError::Poisoned(e.to_string()))
}

#[derive(Debug, Default)]
struct StateInner {
    tasks: BTreeMap<String, TaskInfo>,
    statuses: BTreeMap<String, TaskStatus>,
    properties: HashMap<String, Vec<u8>>,
}

/// InMemoryStateStore keeps task state for tests and the simulated cluster.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    inner: Mutex<StateInner>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn store_tasks(&self, tasks: &[TaskInfo]) -> StateResult<()> {
        let mut inner = lock(&self.inner)?;
        for task in tasks {
            inner.tasks.insert(task.name.clone(), task.clone());
        }
        Ok(())
    }

    fn fetch_task(&self, name: &str) -> StateResult<Option<TaskInfo>> {
        Ok(lock(&self.inner)?.tasks.get(name).cloned())
    }

    fn fetch_tasks(&self) -> StateResult<Vec<TaskInfo>> {
        Ok(lock(&self.inner)?.tasks.values().cloned().collect())
    }

    fn store_status(&self, name: &str, status: &TaskStatus) -> StateResult<()> {
        lock(&self.inner)?
            .statuses
            .insert(name.to_string(), status.clone());
        Ok(())
    }

    fn fetch_status(&self, name: &str) -> StateResult<Option<TaskStatus>> {
        Ok(lock(&self.inner)?.statuses.get(name).cloned())
    }

    fn fetch_statuses(&self) -> StateResult<Vec<TaskStatus>> {
        Ok(lock(&self.inner)?.statuses.values().cloned().collect())
    }

    fn clear_task(&self, name: &str) -> StateResult<()> {
        let mut inner = lock(&self.inner)?;
        inner.tasks.remove(name);
        inner.statuses.remove(name);
        Ok(())
    }

    fn store_property(&self, key: &str, value: Vec<u8>) -> StateResult<()> {
        lock(&self.inner)?.properties.insert(key.to_string(), value);
        Ok(())
    }

    fn fetch_property(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        Ok(lock(&self.inner)?.properties.get(key).cloned())
    }
}

#[derive(Debug, Default)]
struct ConfigInner {
    configs: BTreeMap<ConfigId, ServiceSpec>,
    target: Option<ConfigId>,
}

pub struct InMemoryConfigStore {
    ids: Arc<dyn IdGenerator>,
    inner: Mutex<ConfigInner>,
}

impl InMemoryConfigStore {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ids,
            inner: Mutex::new(ConfigInner::default()),
        }
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn store(&self, spec: &ServiceSpec) -> StateResult<ConfigId> {
        let id = self.ids.config_id();
        lock(&self.inner)?.configs.insert(id, spec.clone());
        Ok(id)
    }

    fn fetch(&self, id: &ConfigId) -> StateResult<ServiceSpec> {
        lock(&self.inner)?
            .configs
            .get(id)
            .cloned()
            .ok_or(StateError::UnknownConfig(*id))
    }

    fn list(&self) -> StateResult<Vec<ConfigId>> {
        Ok(lock(&self.inner)?.configs.keys().copied().collect())
    }

    fn set_target(&self, id: ConfigId) -> StateResult<()> {
        let mut inner = lock(&self.inner)?;
        if !inner.configs.contains_key(&id) {
            return Err(StateError::UnknownConfig(id));
        }
        inner.target = Some(id);
        Ok(())
    }

    fn target(&self) -> StateResult<Option<ConfigId>> {
        Ok(lock(&self.inner)?.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentId, CommandInfo, TaskId, TaskState};
    use crate::ports::{SystemClock, UlidGenerator, fetch_json_property, store_json_property};
    use ulid::Ulid;

    fn task(name: &str) -> TaskInfo {
        TaskInfo {
            name: name.to_string(),
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
    fn tasks_and_statuses_round_trip_by_name() {
        let store = InMemoryStateStore::new();
        let t = task("node-0-server");
        store.store_tasks(std::slice::from_ref(&t)).unwrap();
        store
            .store_status(&t.name, &TaskStatus::new(t.task_id, TaskState::Running))
            .unwrap();

        assert_eq!(store.fetch_task("node-0-server").unwrap(), Some(t.clone()));
        assert_eq!(store.fetch_task_by_id(&t.task_id).unwrap(), Some(t.clone()));
        assert_eq!(store.fetch_statuses().unwrap().len(), 1);

        store.clear_task(&t.name).unwrap();
        assert!(store.fetch_task(&t.name).unwrap().is_none());
        assert!(store.fetch_status(&t.name).unwrap().is_none());
    }

    #[test]
    fn json_properties() {
        let store = InMemoryStateStore::new();
        let mut value = BTreeMap::new();
        value.insert("node-0".to_string(), 42_i64);
        store_json_property(&store, "launch-history", &value).unwrap();

        let back: Option<BTreeMap<String, i64>> =
            fetch_json_property(&store, "launch-history").unwrap();
        assert_eq!(back, Some(value));

        store.store_property("broken", b"{".to_vec()).unwrap();
        let err = fetch_json_property::<BTreeMap<String, i64>>(&store, "broken").unwrap_err();
        assert!(matches!(err, StateError::Serialization { .. }));
    }

    #[test]
    fn config_target_must_exist() {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::new(SystemClock)));
        let configs = InMemoryConfigStore::new(ids.clone());
        let unknown = ids.config_id();
        assert!(matches!(
            configs.set_target(unknown),
            Err(StateError::UnknownConfig(_))
        ));

        let spec = ServiceSpec {
            name: "svc".to_string(),
            role: "role".to_string(),
            principal: "principal".to_string(),
            pods: Vec::new(),
        };
        let id = configs.store(&spec).unwrap();
        configs.set_target(id).unwrap();
        assert_eq!(configs.target().unwrap(), Some(id));
        assert_eq!(configs.fetch(&id).unwrap(), spec);
    }
}
