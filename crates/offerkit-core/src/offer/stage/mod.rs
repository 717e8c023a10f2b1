//! Offer evaluation stages.
//!
//! A closed set of stages, dispatched by `match`. Each consumes the pool
//! and writes into the pod builder, returning an `EvaluationOutcome`.

mod executor;
mod launch;
mod port;
mod resource;
mod volume;

use std::fmt;
use std::sync::Arc;

use crate::domain::{Reservation, ResourceId, TaskInfo};

use super::EvaluationOutcome;
use super::placement::{self, PlacementRule};
use super::pod_builder::PodInfoBuilder;
use super::pool::ResourcePool;

pub use executor::ExecutorStage;
pub use launch::LaunchStage;
pub use port::{PortStage, default_env_key, env_name};
pub use resource::ResourceStage;
pub use volume::VolumeStage;

/// Role and principal new reservations are made under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationTemplate {
    pub role: String,
    pub principal: String,
}

impl ReservationTemplate {
    pub fn new(role: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            principal: principal.into(),
        }
    }

    pub fn with_id(&self, resource_id: ResourceId) -> Reservation {
        Reservation {
            role: self.role.clone(),
            principal: self.principal.clone(),
            resource_id,
        }
    }
}

/// Placement rule bound to the tasks stored at evaluation time.
#[derive(Clone)]
pub struct PlacementStage {
    pub rule: Arc<dyn PlacementRule>,
    pub tasks: Arc<[TaskInfo]>,
}

impl fmt::Debug for PlacementStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacementStage")
            .field("rule", &self.rule)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl PlacementStage {
    pub fn evaluate(&self, pool: &mut ResourcePool, builder: &mut PodInfoBuilder) -> EvaluationOutcome {
        self.rule.filter(pool.offer(), builder.pod_instance(), &self.tasks)
    }
}

#[derive(Debug, Clone)]
pub enum EvaluationStage {
    Placement(PlacementStage),
    Executor(ExecutorStage),
    Resource(ResourceStage),
    Port(PortStage),
    Volume(VolumeStage),
    Launch(LaunchStage),
}

impl EvaluationStage {
    pub fn name(&self) -> &'static str {
        match self {
            EvaluationStage::Placement(_) => placement::NAME,
            EvaluationStage::Executor(_) => executor::NAME,
            EvaluationStage::Resource(_) => resource::NAME,
            EvaluationStage::Port(_) => port::NAME,
            EvaluationStage::Volume(_) => volume::NAME,
            EvaluationStage::Launch(_) => launch::NAME,
        }
    }

    pub fn evaluate(&self, pool: &mut ResourcePool, builder: &mut PodInfoBuilder) -> EvaluationOutcome {
        match self {
            EvaluationStage::Placement(s) => s.evaluate(pool, builder),
            EvaluationStage::Executor(s) => s.evaluate(pool, builder),
            EvaluationStage::Resource(s) => s.evaluate(pool, builder),
            EvaluationStage::Port(s) => s.evaluate(pool, builder),
            EvaluationStage::Volume(s) => s.evaluate(pool, builder),
            EvaluationStage::Launch(s) => s.evaluate(pool, builder),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use ulid::Ulid;

    use super::ReservationTemplate;
    use crate::domain::{
        CheckSpec, ConfigId, ExecutorInfo, ExecutorSpec, PodInstance, PodInstanceRequirement,
        PodSpec, TaskInfo, TaskSpec,
    };
    use crate::offer::pod_builder::PodInfoBuilder;
    use crate::ports::{SystemClock, UlidGenerator};

    pub const ROLE: &str = "test-role";

    pub fn template() -> ReservationTemplate {
        ReservationTemplate::new(ROLE, "test-principal")
    }

    pub fn pod(executor: Option<ExecutorSpec>) -> PodSpec {
        let mut server = TaskSpec::new("server", "./server");
        server.health_check = Some(CheckSpec {
            command: "curl localhost".to_string(),
            interval_secs: 10,
        });
        server.readiness_check = Some(CheckSpec {
            command: "test -f ready".to_string(),
            interval_secs: 5,
        });
        PodSpec {
            pod_type: "node".to_string(),
            count: 1,
            sticky: true,
            placement: None,
            executor,
            tasks: vec![server],
        }
    }

    fn make(
        pod: PodSpec,
        prior: &[TaskInfo],
        running_executor: Option<&ExecutorInfo>,
    ) -> PodInfoBuilder {
        let requirement = PodInstanceRequirement::all_tasks(PodInstance::new(pod, 0));
        PodInfoBuilder::new(
            &requirement,
            ConfigId::from_ulid(Ulid::new()),
            prior,
            running_executor,
            Arc::new(UlidGenerator::new(Arc::new(SystemClock))),
        )
        .unwrap()
    }

    pub fn builder() -> PodInfoBuilder {
        make(pod(None), &[], None)
    }

    pub fn builder_with_prior(prior: &[TaskInfo]) -> PodInfoBuilder {
        make(pod(None), prior, None)
    }

    pub fn executor_builder(running: Option<&ExecutorInfo>) -> PodInfoBuilder {
        let executor = ExecutorSpec {
            name: "node-executor".to_string(),
            command: None,
            resources: Vec::new(),
        };
        make(pod(Some(executor)), &[], running)
    }
}
