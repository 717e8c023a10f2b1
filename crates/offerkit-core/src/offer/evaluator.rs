//! OfferEvaluator - finds the first offer that satisfies a requirement.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    ConfigId, ExecutorInfo, Offer, OfferId, OfferRecommendation, PodInstanceRequirement, TaskInfo,
    TaskStatus,
};
use crate::error::SchedulerResult;
use crate::ports::{IdGenerator, StateStore};

use super::pipeline::OfferEvaluationPipeline;
use super::pod_builder::PodInfoBuilder;
use super::pool::ResourcePool;
use super::requirement::{StageContext, build_stages};
use super::stage::ReservationTemplate;

/// Winning offer for one requirement.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub offer_id: OfferId,
    pub recommendations: Vec<OfferRecommendation>,
}

impl EvaluationResult {
    pub fn launched_tasks(&self) -> Vec<TaskInfo> {
        self.recommendations
            .iter()
            .flat_map(|r| r.launched_tasks().iter().cloned())
            .collect()
    }
}

pub struct OfferEvaluator {
    state: Arc<dyn StateStore>,
    ids: Arc<dyn IdGenerator>,
    reservation: ReservationTemplate,
}

impl OfferEvaluator {
    pub fn new(
        state: Arc<dyn StateStore>,
        ids: Arc<dyn IdGenerator>,
        reservation: ReservationTemplate,
    ) -> Self {
        Self {
            state,
            ids,
            reservation,
        }
    }

    pub fn reservation(&self) -> &ReservationTemplate {
        &self.reservation
    }

    /// Evaluates `requirement` against `offers` in order and returns the
    /// first passing result. Each offer gets a fresh pool and builder, so a
    /// failed attempt leaves nothing behind.
    pub fn evaluate(
        &self,
        requirement: &PodInstanceRequirement,
        target: ConfigId,
        offers: &[&Offer],
    ) -> SchedulerResult<Option<EvaluationResult>> {
        let all_tasks: Arc<[TaskInfo]> = self.state.fetch_tasks()?.into();
        let statuses: HashMap<String, TaskStatus> = all_tasks
            .iter()
            .filter_map(|t| {
                self.state
                    .fetch_status(&t.name)
                    .transpose()
                    .map(|s| s.map(|s| (t.name.clone(), s)))
            })
            .collect::<Result<_, _>>()?;

        let instance_prefix = format!("{}-", requirement.pod_instance.name());
        let prior: Vec<TaskInfo> = all_tasks
            .iter()
            .filter(|t| belongs_to(t, &requirement.pod_instance.pod.pod_type, requirement.pod_instance.index, &instance_prefix))
            .cloned()
            .collect();
        let launching = requirement.full_task_names();
        let running_executor = running_executor(&prior, &statuses, &launching);

        let ctx = StageContext {
            reservation: &self.reservation,
            prior: &prior,
            running_executor: running_executor.as_ref(),
            all_tasks: Arc::clone(&all_tasks),
        };
        let pipeline = OfferEvaluationPipeline::new(build_stages(requirement, &ctx)?);
        let pod = requirement.pod_instance.name();

        for offer in offers {
            let mut pool = ResourcePool::new(offer, &self.reservation.role);
            let mut builder = PodInfoBuilder::new(
                requirement,
                target,
                &prior,
                running_executor.as_ref(),
                Arc::clone(&self.ids),
            )?;
            let result = pipeline.run(&mut pool, &mut builder);
            if result.outcome.is_passing() {
                info!(
                    pod = %pod,
                    offer = %offer.id,
                    host = %offer.hostname,
                    operations = result.outcome.recommendations.len(),
                    "offer accepted"
                );
                return Ok(Some(EvaluationResult {
                    offer_id: offer.id.clone(),
                    recommendations: result.outcome.recommendations,
                }));
            }
            debug!(
                pod = %pod,
                offer = %offer.id,
                stage = result.outcome.source,
                reason = %result.outcome.reason,
                "offer does not match"
            );
        }
        Ok(None)
    }
}

fn belongs_to(task: &TaskInfo, pod_type: &str, index: u32, prefix: &str) -> bool {
    match (task.pod_type(), task.pod_index()) {
        (Ok(t), Ok(i)) => t == pod_type && i == index,
        _ => task.name.starts_with(prefix),
    }
}

/// Executor of a sibling task that is not being relaunched and still runs.
fn running_executor(
    prior: &[TaskInfo],
    statuses: &HashMap<String, TaskStatus>,
    launching: &[String],
) -> Option<ExecutorInfo> {
    prior
        .iter()
        .filter(|t| !launching.contains(&t.name))
        .filter(|t| {
            statuses
                .get(&t.name)
                .is_some_and(|s| s.task_id == t.task_id && !s.state.is_terminal())
        })
        .filter_map(|t| t.executor.clone())
        .find(|e| !e.executor_id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{CPUS, MEM, PORTS};
    use crate::domain::{PodInstance, PodSpec, PortSpec, Range, Resource, TaskSpec};
    use crate::impls::InMemoryStateStore;
    use crate::ports::{SystemClock, UlidGenerator};
    use ulid::Ulid;

    fn evaluator(state: Arc<dyn StateStore>) -> OfferEvaluator {
        OfferEvaluator::new(
            state,
            Arc::new(UlidGenerator::new(Arc::new(SystemClock))),
            ReservationTemplate::new("role", "principal"),
        )
    }

    fn requirement() -> PodInstanceRequirement {
        let pod = PodSpec {
            pod_type: "node".to_string(),
            count: 1,
            sticky: true,
            placement: None,
            executor: None,
            tasks: vec![
                TaskSpec::new("server", "./server")
                    .with_resource(CPUS, 1.0)
                    .with_resource(MEM, 256.0)
                    .with_port(PortSpec::new("http", 0)),
            ],
        };
        PodInstanceRequirement::all_tasks(PodInstance::new(pod, 0))
    }

    fn offer(id: &str, cpus: f64) -> Offer {
        Offer::new(id, "agent-1", "host-1")
            .with_resource(Resource::scalar(CPUS, cpus))
            .with_resource(Resource::scalar(MEM, 1024.0))
            .with_resource(Resource::ranges(PORTS, vec![Range::new(5000, 10000)]))
    }

    #[test]
    fn skips_offers_that_fail_and_takes_the_first_match() {
        let state: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let small = offer("small", 0.5);
        let big = offer("big", 4.0);

        let result = evaluator(state)
            .evaluate(&requirement(), ConfigId::from_ulid(Ulid::new()), &[&small, &big])
            .unwrap()
            .unwrap();

        assert_eq!(result.offer_id.as_str(), "big");
        let tasks = result.launched_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "node-0-server");
        assert_eq!(tasks[0].hostname, "host-1");
        assert_eq!(tasks[0].command.env.get("PORT_HTTP").map(String::as_str), Some("5000"));
    }

    #[test]
    fn relaunch_reuses_every_reservation() {
        let state: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let evaluator = evaluator(Arc::clone(&state));
        let target = ConfigId::from_ulid(Ulid::new());
        let first = evaluator
            .evaluate(&requirement(), target, &[&offer("o1", 2.0)])
            .unwrap()
            .unwrap();
        let launched = first.launched_tasks();
        state.store_tasks(&launched).unwrap();

        // the cluster offers back exactly what was reserved
        let mut reoffer = Offer::new("o2", "agent-1", "host-1");
        for r in &launched[0].resources {
            reoffer = reoffer.with_resource(r.clone());
        }
        let second = evaluator
            .evaluate(&requirement(), target, &[&reoffer])
            .unwrap()
            .unwrap();

        assert!(second.recommendations.iter().all(|r| !r.is_reserve()));
        let relaunched = second.launched_tasks();
        let ids = |t: &TaskInfo| t.resources.iter().map(|r| r.resource_id()).collect::<Vec<_>>();
        assert_eq!(ids(&relaunched[0]), ids(&launched[0]));
        assert_ne!(relaunched[0].task_id, launched[0].task_id);
    }

    #[test]
    fn no_offer_matches() {
        let state: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let result = evaluator(state)
            .evaluate(&requirement(), ConfigId::from_ulid(Ulid::new()), &[&offer("o", 0.1)])
            .unwrap();
        assert!(result.is_none());
    }
}
