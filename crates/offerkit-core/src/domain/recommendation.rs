//! Offer operations recommended by evaluation.

use serde::{Deserialize, Serialize};

use super::ids::{AgentId, OfferId};
use super::resource::Resource;
use super::task::{ExecutorInfo, TaskInfo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Reserve { resources: Vec<Resource> },
    Unreserve { resources: Vec<Resource> },
    /// Create persistent volumes on reserved disk.
    Create { volumes: Vec<Resource> },
    Destroy { volumes: Vec<Resource> },
    /// Launch tasks under a (possibly shared) executor.
    LaunchGroup {
        executor: Option<ExecutorInfo>,
        tasks: Vec<TaskInfo>,
    },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Reserve { .. } => "RESERVE",
            Operation::Unreserve { .. } => "UNRESERVE",
            Operation::Create { .. } => "CREATE",
            Operation::Destroy { .. } => "DESTROY",
            Operation::LaunchGroup { .. } => "LAUNCH_GROUP",
        }
    }
}

/// One operation against one offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRecommendation {
    pub offer_id: OfferId,
    pub agent_id: AgentId,
    pub operation: Operation,
}

impl OfferRecommendation {
    pub fn new(offer_id: OfferId, agent_id: AgentId, operation: Operation) -> Self {
        Self {
            offer_id,
            agent_id,
            operation,
        }
    }

    pub fn is_reserve(&self) -> bool {
        matches!(self.operation, Operation::Reserve { .. })
    }

    pub fn launched_tasks(&self) -> &[TaskInfo] {
        match &self.operation {
            Operation::LaunchGroup { tasks, .. } => tasks,
            _ => &[],
        }
    }
}
