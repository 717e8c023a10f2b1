//! Offer snapshot from the cluster manager.

use serde::{Deserialize, Serialize};

use super::ids::{AgentId, ExecutorId, OfferId};
use super::resource::Resource;

/// Resources available on one agent at one instant.
///
/// Immutable once received; consumed by at most one pod per scheduling pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub agent_id: AgentId,
    pub hostname: String,
    pub resources: Vec<Resource>,
    /// Executors already running on the agent for this framework.
    #[serde(default)]
    pub executor_ids: Vec<ExecutorId>,
}

impl Offer {
    pub fn new(id: impl Into<String>, agent_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            id: OfferId::new(id),
            agent_id: AgentId::new(agent_id),
            hostname: hostname.into(),
            resources: Vec::new(),
            executor_ids: Vec::new(),
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_executor(mut self, executor_id: ExecutorId) -> Self {
        self.executor_ids.push(executor_id);
        self
    }

    pub fn has_executor(&self, executor_id: &ExecutorId) -> bool {
        self.executor_ids.iter().any(|id| id == executor_id)
    }
}
