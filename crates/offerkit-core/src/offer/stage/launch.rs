//! Launch stage: one `LaunchGroup` per task, placed on the offer's agent.

use crate::domain::{OfferRecommendation, Operation};
use crate::offer::pod_builder::PodInfoBuilder;
use crate::offer::pool::ResourcePool;
use crate::offer::EvaluationOutcome;

pub(crate) const NAME: &str = "launch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaunchStage;

impl LaunchStage {
    pub fn evaluate(&self, pool: &mut ResourcePool, builder: &mut PodInfoBuilder) -> EvaluationOutcome {
        let tasks = builder.build_tasks(pool.agent_id(), pool.hostname());
        let names = tasks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ");
        let reason = format!("launching [{names}] on {}", pool.hostname());
        let recommendations = tasks
            .into_iter()
            .map(|task| {
                OfferRecommendation::new(
                    pool.offer_id().clone(),
                    pool.agent_id().clone(),
                    Operation::LaunchGroup {
                        executor: builder.executor().cloned(),
                        tasks: vec![task],
                    },
                )
            })
            .collect();
        EvaluationOutcome::pass(NAME, reason).with_recommendations(recommendations)
    }
}
