//! SimulatedCluster - in-process cluster manager for demos and tests.
//!
//! Keeps per-agent capacity and reservations, turns them into offers on
//! demand, and answers launches, kills and reconciliation with task
//! statuses pushed back on the scheduler's event channel.
//!
//! # Simplifications
//! - launched tasks go straight to RUNNING (FINISHED-goal tasks then finish)
//! - operations are trusted: a Reserve is not checked against capacity
//! - an offer not accepted or declined is rescinded by the next round

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::app::SchedulerEvent;
use crate::domain::resource::{CPUS, DISK, MEM, PORTS};
use crate::domain::{
    AgentId, GoalState, Offer, OfferId, Operation, Range, Resource, ResourceId, TaskId, TaskInfo,
    TaskState, TaskStatus,
};
use crate::ports::{ClusterDriver, DriverError, ReconcileRequest};

/// Capacity of one simulated agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub hostname: String,
    pub cpus: f64,
    pub mem: f64,
    pub disk: f64,
    pub ports: Range,
}

impl AgentSpec {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            cpus: 4.0,
            mem: 8192.0,
            disk: 20480.0,
            ports: Range::new(10_000, 10_100),
        }
    }
}

#[derive(Debug)]
struct Agent {
    id: AgentId,
    spec: AgentSpec,
    /// Reserved resources by reservation id, volumes included.
    reserved: BTreeMap<ResourceId, Resource>,
}

#[derive(Debug)]
struct SimTask {
    info: TaskInfo,
    state: TaskState,
}

#[derive(Debug)]
struct ClusterInner {
    events: mpsc::UnboundedSender<SchedulerEvent>,
    agents: Vec<Agent>,
    tasks: BTreeMap<TaskId, SimTask>,
    /// Latest attempt by task name.
    latest: BTreeMap<String, TaskId>,
    /// Outstanding offers and the agent (index) they came from.
    offers: BTreeMap<OfferId, usize>,
    next_offer: u64,
}

pub struct SimulatedCluster {
    inner: Mutex<ClusterInner>,
}

impl SimulatedCluster {
    pub fn new(agents: Vec<AgentSpec>, events: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        let agents = agents
            .into_iter()
            .enumerate()
            .map(|(i, spec)| Agent {
                id: AgentId::new(format!("agent-{i}")),
                spec,
                reserved: BTreeMap::new(),
            })
            .collect();
        Self {
            inner: Mutex::new(ClusterInner {
                events,
                agents,
                tasks: BTreeMap::new(),
                latest: BTreeMap::new(),
                offers: BTreeMap::new(),
                next_offer: 0,
            }),
        }
    }

    /// Sends further events to a new scheduler, as after a scheduler
    /// restart. Outstanding offers are rescinded.
    pub async fn reconnect(&self, events: mpsc::UnboundedSender<SchedulerEvent>) {
        let mut inner = self.inner.lock().await;
        inner.events = events;
        inner.offers.clear();
    }

    /// Rescinds outstanding offers and sends one fresh offer per agent.
    /// Returns the number of offers sent.
    pub async fn offer_round(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.offers.clear();
        let mut offers = Vec::with_capacity(inner.agents.len());
        for index in 0..inner.agents.len() {
            inner.next_offer += 1;
            let id = OfferId::new(format!("offer-{}", inner.next_offer));
            offers.push(inner.offer(index, id.clone()));
            inner.offers.insert(id, index);
        }
        let count = offers.len();
        inner.send(SchedulerEvent::Offers(offers));
        count
    }

    /// Fails the running attempt of task `name`. False if none is running.
    pub async fn fail_task(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(task_id) = inner.latest.get(name).copied() else {
            return false;
        };
        let Some(task) = inner.tasks.get_mut(&task_id).filter(|t| !t.state.is_terminal()) else {
            return false;
        };
        task.state = TaskState::Failed;
        let status = TaskStatus {
            message: "simulated failure".to_string(),
            ..TaskStatus::new(task.info.task_id, TaskState::Failed)
        };
        info!(task = name, "simulated task failure");
        inner.send(SchedulerEvent::TaskStatus(status));
        true
    }

    /// State of the latest attempt of every task, by task name.
    pub async fn task_states(&self) -> BTreeMap<String, TaskState> {
        let inner = self.inner.lock().await;
        inner
            .latest
            .iter()
            .filter_map(|(name, id)| inner.tasks.get(id).map(|t| (name.clone(), t.state)))
            .collect()
    }

    /// Number of reservations held on all agents.
    pub async fn reservation_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.agents.iter().map(|a| a.reserved.len()).sum()
    }

}

impl ClusterInner {
    fn send(&self, event: SchedulerEvent) {
        // nobody listening: the scheduler has stopped
        if self.events.send(event).is_err() {
            debug!("scheduler event channel closed");
        }
    }

    fn offer(&self, index: usize, id: OfferId) -> Offer {
        let agent = &self.agents[index];
        let active: Vec<&TaskInfo> = self
            .tasks
            .values()
            .filter(|t| t.info.agent_id == agent.id && !t.state.is_terminal())
            .map(|t| &t.info)
            .collect();
        let in_use: BTreeSet<ResourceId> = active
            .iter()
            .copied()
            .flat_map(TaskInfo::all_resources)
            .filter_map(Resource::resource_id)
            .collect();

        let mut offer = Offer::new(id.as_str(), agent.id.as_str(), agent.spec.hostname.clone());
        for (name, capacity) in [
            (CPUS, agent.spec.cpus),
            (MEM, agent.spec.mem),
            (DISK, agent.spec.disk),
        ] {
            let reserved: f64 = agent
                .reserved
                .values()
                .filter(|r| r.name == name)
                .filter_map(Resource::scalar_value)
                .sum();
            let free = capacity - reserved;
            if free > 0.0 {
                offer = offer.with_resource(Resource::scalar(name, free));
            }
        }
        let free_ports = agent
            .reserved
            .values()
            .filter(|r| r.name == PORTS)
            .flat_map(|r| r.range_values().iter().copied())
            .fold(vec![agent.spec.ports], subtract_range);
        if !free_ports.is_empty() {
            offer = offer.with_resource(Resource::ranges(PORTS, free_ports));
        }

        for (id, resource) in &agent.reserved {
            if !in_use.contains(id) {
                offer = offer.with_resource(resource.clone());
            }
        }
        let executors: BTreeSet<_> = active
            .iter()
            .copied()
            .filter_map(|t| t.executor.as_ref())
            .map(|e| e.executor_id.clone())
            .collect();
        for executor_id in executors {
            offer = offer.with_executor(executor_id);
        }
        offer
    }

    fn apply(&mut self, index: usize, operation: Operation, statuses: &mut Vec<TaskStatus>) {
        let agent = &mut self.agents[index];
        match operation {
            Operation::Reserve { resources } => {
                for resource in resources {
                    if let Some(id) = resource.resource_id() {
                        agent.reserved.insert(id, resource);
                    }
                }
            }
            Operation::Unreserve { resources } => {
                for resource in resources {
                    if let Some(id) = resource.resource_id() {
                        agent.reserved.remove(&id);
                    }
                }
            }
            Operation::Create { volumes } => {
                for volume in volumes {
                    if let Some(id) = volume.resource_id() {
                        agent.reserved.insert(id, volume);
                    }
                }
            }
            Operation::Destroy { volumes } => {
                for volume in volumes {
                    if let Some(id) = volume.resource_id() {
                        if let Some(reserved) = agent.reserved.get_mut(&id) {
                            reserved.disk = None;
                        }
                    }
                }
            }
            Operation::LaunchGroup { tasks, .. } => {
                for info in tasks {
                    statuses.push(TaskStatus::new(info.task_id, TaskState::Running));
                    let state = if info.goal_state().ok() == Some(GoalState::Finished) {
                        statuses.push(TaskStatus::new(info.task_id, TaskState::Finished));
                        TaskState::Finished
                    } else {
                        TaskState::Running
                    };
                    self.latest.insert(info.name.clone(), info.task_id);
                    self.tasks.insert(info.task_id, SimTask { info, state });
                }
            }
        }
    }

    fn status_of(&self, task_id: &TaskId) -> TaskStatus {
        match self.tasks.get(task_id) {
            Some(task) => TaskStatus::new(*task_id, task.state),
            None => TaskStatus {
                message: "unknown task".to_string(),
                ..TaskStatus::new(*task_id, TaskState::Lost)
            },
        }
    }
}

/// `free` without the values of `used`.
fn subtract_range(free: Vec<Range>, used: Range) -> Vec<Range> {
    let mut out = Vec::with_capacity(free.len() + 1);
    for r in free {
        if used.end < r.begin || used.begin > r.end {
            out.push(r);
            continue;
        }
        if used.begin > r.begin {
            out.push(Range::new(r.begin, used.begin - 1));
        }
        if used.end < r.end {
            out.push(Range::new(used.end + 1, r.end));
        }
    }
    out
}

#[async_trait]
impl ClusterDriver for SimulatedCluster {
    async fn accept(&self, offer_id: &OfferId, operations: Vec<Operation>) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().await;
        let index = inner
            .offers
            .remove(offer_id)
            .ok_or_else(|| DriverError::UnknownOffer(offer_id.clone()))?;
        let mut statuses = Vec::new();
        for operation in operations {
            debug!(offer = %offer_id, operation = operation.kind(), "applying operation");
            inner.apply(index, operation, &mut statuses);
        }
        for status in statuses {
            inner.send(SchedulerEvent::TaskStatus(status));
        }
        Ok(())
    }

    async fn decline(&self, offer_id: &OfferId) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().await;
        inner
            .offers
            .remove(offer_id)
            .map(|_| ())
            .ok_or_else(|| DriverError::UnknownOffer(offer_id.clone()))
    }

    async fn kill(&self, task_id: &TaskId) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.tasks.get_mut(task_id).filter(|t| !t.state.is_terminal()) {
            task.state = TaskState::Killed;
        }
        let status = inner.status_of(task_id);
        inner.send(SchedulerEvent::TaskStatus(status));
        Ok(())
    }

    async fn reconcile(&self, request: ReconcileRequest) -> Result<(), DriverError> {
        let inner = self.inner.lock().await;
        let statuses: Vec<TaskStatus> = match request {
            ReconcileRequest::Explicit(ids) => ids.iter().map(|id| inner.status_of(id)).collect(),
            ReconcileRequest::Implicit => inner
                .tasks
                .iter()
                .map(|(id, t)| TaskStatus::new(*id, t.state))
                .collect(),
        };
        for status in statuses {
            inner.send(SchedulerEvent::TaskStatus(status));
        }
        Ok(())
    }
}
