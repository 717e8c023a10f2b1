//! Executor stage: matches the expected executor id and assigns one.

use crate::domain::ExecutorId;
use crate::offer::pod_builder::PodInfoBuilder;
use crate::offer::pool::ResourcePool;
use crate::offer::EvaluationOutcome;

pub(crate) const NAME: &str = "executor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutorStage;

impl ExecutorStage {
    pub fn evaluate(&self, pool: &mut ResourcePool, builder: &mut PodInfoBuilder) -> EvaluationOutcome {
        let Some(executor) = builder.executor_mut() else {
            return EvaluationOutcome::pass(NAME, "No executor requirement defined");
        };

        let expected = &executor.executor_id;
        if !expected.is_empty() && !pool.offer().has_executor(expected) {
            return EvaluationOutcome::fail(
                NAME,
                format!("Offer does not contain the needed Executor ID: '{expected}'"),
            );
        }

        if expected.is_empty() {
            executor.executor_id = ExecutorId::from_name(&executor.name);
            EvaluationOutcome::pass(
                NAME,
                format!("No Executor ID expected, generated: {}", executor.executor_id),
            )
        } else {
            EvaluationOutcome::pass(
                NAME,
                format!("Offer contains the matching Executor ID: {expected}"),
            )
        }
    }
}
