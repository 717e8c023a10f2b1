//! Turns a `PodInstanceRequirement` into the ordered stage list.
//!
//! Previously launched TaskInfos of the instance supply the reservation ids
//! to reuse, unless the instance is being permanently replaced.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::resource::{DISK, PORTS};
use crate::domain::{
    ExecutorInfo, PodInstanceRequirement, RecoveryType, Resource, ResourceId, TaskInfo,
};

use super::discovery::DiscoveryInfoWriter;
use super::placement::rule_for;
use super::pod_builder::BuildTarget;
use super::stage::{
    EvaluationStage, ExecutorStage, LaunchStage, PlacementStage, PortStage, ReservationTemplate,
    ResourceStage, VolumeStage, default_env_key, env_name,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequirementError {
    #[error("pod {pod} has no task named '{task}'")]
    UnknownTask { pod: String, task: String },

    #[error("pod instance {pod} is out of range: count is {count}")]
    IndexOutOfRange { pod: String, count: u32 },

    #[error("requirement for pod {0} names no tasks")]
    Empty(String),
}

/// Inputs besides the requirement itself.
pub struct StageContext<'a> {
    pub reservation: &'a ReservationTemplate,
    /// Stored TaskInfos of this pod instance.
    pub prior: &'a [TaskInfo],
    /// Executor still running for this instance, if any.
    pub running_executor: Option<&'a ExecutorInfo>,
    /// Every stored task, for placement rules.
    pub all_tasks: Arc<[TaskInfo]>,
}

/// Stage order: placement, executor, per task (resources, ports, volumes),
/// executor resources, launch.
pub fn build_stages(
    requirement: &PodInstanceRequirement,
    ctx: &StageContext<'_>,
) -> Result<Vec<EvaluationStage>, RequirementError> {
    let instance = &requirement.pod_instance;
    let pod = &instance.pod;
    if requirement.task_names.is_empty() {
        return Err(RequirementError::Empty(instance.name()));
    }
    if instance.index >= pod.count {
        return Err(RequirementError::IndexOutOfRange {
            pod: instance.name(),
            count: pod.count,
        });
    }

    let reuse = requirement.recovery_type != RecoveryType::Permanent;

    let mut stages = Vec::new();
    if let Some(placement) = &pod.placement {
        stages.push(EvaluationStage::Placement(PlacementStage {
            rule: rule_for(placement),
            tasks: Arc::clone(&ctx.all_tasks),
        }));
    }
    stages.push(EvaluationStage::Executor(ExecutorStage));

    for short in &requirement.task_names {
        let spec = pod.task(short).ok_or_else(|| RequirementError::UnknownTask {
            pod: instance.name(),
            task: short.clone(),
        })?;
        let target = BuildTarget::Task(short.clone());
        let full_name = instance.task_name(short);
        let previous = ctx
            .prior
            .iter()
            .filter(|_| reuse)
            .find(|t| t.name == full_name);

        for r in &spec.resources {
            stages.push(EvaluationStage::Resource(ResourceStage {
                target: target.clone(),
                name: r.name.clone(),
                amount: r.amount,
                expected_id: previous.and_then(|p| scalar_id(&p.resources, &r.name)),
                reservation: ctx.reservation.clone(),
            }));
        }

        for p in &spec.ports {
            let env_key = match &p.env_key {
                Some(key) => env_name(key),
                None => default_env_key(&p.name),
            };
            let expected_id = previous.and_then(|t| port_id(t, &env_key, p.port));
            let writer = match &p.vip {
                Some(vip) => DiscoveryInfoWriter::vip(vip),
                None => DiscoveryInfoWriter::port(&p.name),
            };
            stages.push(EvaluationStage::Port(PortStage {
                target: target.clone(),
                port_name: p.name.clone(),
                port: p.port,
                env_key,
                expected_id,
                writer,
                reservation: ctx.reservation.clone(),
            }));
        }

        for v in &spec.volumes {
            let expected_id = previous.and_then(|t| {
                t.resources
                    .iter()
                    .find(|r| {
                        r.name == DISK
                            && r.disk.as_ref().is_some_and(|d| d.container_path == v.container_path)
                    })
                    .and_then(Resource::resource_id)
            });
            stages.push(EvaluationStage::Volume(VolumeStage {
                target: target.clone(),
                container_path: v.container_path.clone(),
                size_mb: v.size_mb,
                expected_id,
                reservation: ctx.reservation.clone(),
            }));
        }
    }

    // A running executor already holds its resources.
    let launching_executor = !(reuse && ctx.running_executor.is_some());
    if let (Some(executor), true) = (&pod.executor, launching_executor) {
        let previous = ctx
            .prior
            .iter()
            .filter(|_| reuse)
            .filter_map(|t| t.executor.as_ref())
            .find(|e| e.name == executor.name);
        for r in &executor.resources {
            stages.push(EvaluationStage::Resource(ResourceStage {
                target: BuildTarget::Executor,
                name: r.name.clone(),
                amount: r.amount,
                expected_id: previous.and_then(|e| scalar_id(&e.resources, &r.name)),
                reservation: ctx.reservation.clone(),
            }));
        }
    }

    stages.push(EvaluationStage::Launch(LaunchStage));
    Ok(stages)
}

fn scalar_id(resources: &[Resource], name: &str) -> Option<ResourceId> {
    resources
        .iter()
        .filter(|r| r.name == name && r.disk.is_none() && r.scalar_value().is_some())
        .find_map(Resource::resource_id)
}

/// Reservation of the port previously exposed under `env_key`. A fixed port
/// that changed since then gets a fresh reservation instead.
fn port_id(task: &TaskInfo, env_key: &str, wanted: u64) -> Option<ResourceId> {
    let previous: u64 = task.command.env.get(env_key)?.parse().ok()?;
    if wanted != 0 && wanted != previous {
        return None;
    }
    task.resources
        .iter()
        .filter(|r| r.name == PORTS)
        .find(|r| r.first_port() == Some(previous))
        .and_then(Resource::resource_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::CPUS;
    use crate::domain::{
        AgentId, ExecutorSpec, PlacementSpec, PodInstance, PodSpec, PortSpec, Range, TaskId,
        TaskSpec,
    };
    use crate::offer::stage::test_support::template;
    use ulid::Ulid;

    fn pod() -> PodSpec {
        PodSpec {
            pod_type: "node".to_string(),
            count: 2,
            sticky: true,
            placement: Some(PlacementSpec::MaxPerHostname { max: 1 }),
            executor: Some(ExecutorSpec {
                name: "node-executor".to_string(),
                command: None,
                resources: vec![crate::domain::ResourceSpec::new(CPUS, 0.1)],
            }),
            tasks: vec![
                TaskSpec::new("server", "./server")
                    .with_resource(CPUS, 1.0)
                    .with_port(PortSpec::new("http", 0)),
            ],
        }
    }

    fn prior_task(cpus_id: ResourceId, port_id: ResourceId) -> TaskInfo {
        let mut task = TaskInfo {
            name: "node-0-server".to_string(),
            task_id: TaskId::from_ulid(Ulid::new()),
            agent_id: AgentId::new("a"),
            hostname: "h".to_string(),
            resources: vec![
                Resource::scalar(CPUS, 1.0).reserved(template().with_id(cpus_id)),
                Resource::ranges(PORTS, vec![Range::single(5000)]).reserved(template().with_id(port_id)),
            ],
            command: Default::default(),
            health_check: None,
            readiness_check: None,
            discovery: None,
            executor: None,
            labels: Default::default(),
        };
        task.command.env.insert("PORT_HTTP".to_string(), "5000".to_string());
        task
    }

    fn ctx<'a>(reservation: &'a ReservationTemplate, prior: &'a [TaskInfo]) -> StageContext<'a> {
        StageContext {
            reservation,
            prior,
            running_executor: None,
            all_tasks: Arc::from(Vec::new()),
        }
    }

    #[test]
    fn stages_follow_declared_order() {
        let req = PodInstanceRequirement::all_tasks(PodInstance::new(pod(), 0));
        let reservation = template();
        let stages = build_stages(&req, &ctx(&reservation, &[])).unwrap();
        let names: Vec<_> = stages.iter().map(EvaluationStage::name).collect();
        assert_eq!(
            names,
            vec!["placement", "executor", "resource", "port", "resource", "launch"]
        );
    }

    #[test]
    fn prior_reservations_are_expected_unless_permanent() {
        let (cpus_id, port_res) = (ResourceId::from_ulid(Ulid::new()), ResourceId::from_ulid(Ulid::new()));
        let prior = vec![prior_task(cpus_id, port_res)];
        let reservation = template();
        let req = PodInstanceRequirement::all_tasks(PodInstance::new(pod(), 0));

        let stages = build_stages(&req, &ctx(&reservation, &prior)).unwrap();
        let EvaluationStage::Resource(cpus) = &stages[2] else { panic!() };
        let EvaluationStage::Port(port) = &stages[3] else { panic!() };
        assert_eq!(cpus.expected_id, Some(cpus_id));
        assert_eq!(port.expected_id, Some(port_res));

        let req = req.with_recovery(RecoveryType::Permanent);
        let stages = build_stages(&req, &ctx(&reservation, &prior)).unwrap();
        let EvaluationStage::Resource(cpus) = &stages[2] else { panic!() };
        assert_eq!(cpus.expected_id, None);
    }

    #[test]
    fn changed_fixed_port_is_not_reused() {
        let prior = prior_task(ResourceId::from_ulid(Ulid::new()), ResourceId::from_ulid(Ulid::new()));
        assert!(port_id(&prior, "PORT_HTTP", 0).is_some());
        assert!(port_id(&prior, "PORT_HTTP", 5000).is_some());
        assert!(port_id(&prior, "PORT_HTTP", 6000).is_none());
    }

    #[test]
    fn running_executor_skips_executor_resources() {
        let reservation = template();
        let running = ExecutorInfo {
            executor_id: crate::domain::ExecutorId::new("node-executor__x"),
            name: "node-executor".to_string(),
            command: Default::default(),
            resources: Vec::new(),
            discovery: None,
        };
        let mut context = ctx(&reservation, &[]);
        context.running_executor = Some(&running);
        let req = PodInstanceRequirement::all_tasks(PodInstance::new(pod(), 0));

        let stages = build_stages(&req, &context).unwrap();
        assert_eq!(stages.len(), 5);
    }

    #[test]
    fn rejects_unknown_tasks_and_indices() {
        let reservation = template();
        let req = PodInstanceRequirement::new(PodInstance::new(pod(), 0), vec!["nope".to_string()]);
        assert!(matches!(
            build_stages(&req, &ctx(&reservation, &[])),
            Err(RequirementError::UnknownTask { .. })
        ));

        let req = PodInstanceRequirement::all_tasks(PodInstance::new(pod(), 5));
        assert!(matches!(
            build_stages(&req, &ctx(&reservation, &[])),
            Err(RequirementError::IndexOutOfRange { .. })
        ));
    }
}
