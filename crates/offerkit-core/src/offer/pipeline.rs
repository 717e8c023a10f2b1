//! Fail-fast evaluation pipeline for one (offer, pod) pair.

use super::outcome::EvaluationOutcome;
use super::pod_builder::PodInfoBuilder;
use super::pool::ResourcePool;
use super::stage::EvaluationStage;

const NAME: &str = "pipeline";

#[derive(Debug, Clone)]
pub struct OfferEvaluationPipeline {
    stages: Vec<EvaluationStage>,
}

/// Aggregate outcome plus the outcome of every stage that actually ran.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub outcome: EvaluationOutcome,
    pub stage_outcomes: Vec<EvaluationOutcome>,
}

impl OfferEvaluationPipeline {
    pub fn new(stages: Vec<EvaluationStage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[EvaluationStage] {
        &self.stages
    }

    /// Runs stages in order and stops at the first FAIL.
    ///
    /// # Design
    /// - PASS: recommendations of all stages, concatenated in stage order
    /// - FAIL: the failing stage's source and reason, carrying the
    ///   recommendations of the stages before it so the caller can drop
    ///   them as a unit
    pub fn run(&self, pool: &mut ResourcePool, builder: &mut PodInfoBuilder) -> PipelineResult {
        let mut recommendations = Vec::new();
        let mut stage_outcomes = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let outcome = stage.evaluate(pool, builder);
            if !outcome.is_passing() {
                let failed = EvaluationOutcome::fail(outcome.source, outcome.reason.clone())
                    .with_recommendations(recommendations);
                stage_outcomes.push(outcome);
                return PipelineResult {
                    outcome: failed,
                    stage_outcomes,
                };
            }
            recommendations.extend(outcome.recommendations.iter().cloned());
            stage_outcomes.push(outcome);
        }

        let reason = format!("passed {} stages", self.stages.len());
        PipelineResult {
            outcome: EvaluationOutcome::pass(NAME, reason).with_recommendations(recommendations),
            stage_outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{CPUS, MEM};
    use crate::domain::{Offer, Resource};
    use crate::offer::pod_builder::BuildTarget;
    use crate::offer::stage::test_support::{builder, template, ROLE};
    use crate::offer::stage::{LaunchStage, ResourceStage};

    fn scalar(name: &str, amount: f64) -> EvaluationStage {
        EvaluationStage::Resource(ResourceStage {
            target: BuildTarget::Task("server".to_string()),
            name: name.to_string(),
            amount,
            expected_id: None,
            reservation: template(),
        })
    }

    fn offer() -> Offer {
        Offer::new("o", "a", "h")
            .with_resource(Resource::scalar(CPUS, 1.0))
            .with_resource(Resource::scalar(MEM, 256.0))
    }

    #[test]
    fn passing_pipeline_concatenates_in_order() {
        let pipeline = OfferEvaluationPipeline::new(vec![
            scalar(CPUS, 1.0),
            scalar(MEM, 128.0),
            EvaluationStage::Launch(LaunchStage),
        ]);
        let mut pool = ResourcePool::new(&offer(), ROLE);

        let result = pipeline.run(&mut pool, &mut builder());

        assert!(result.outcome.is_passing());
        let kinds: Vec<_> = result
            .outcome
            .recommendations
            .iter()
            .map(|r| r.operation.kind())
            .collect();
        assert_eq!(kinds, vec!["RESERVE", "RESERVE", "LAUNCH_GROUP"]);
        let launched = result.outcome.recommendations[2].launched_tasks();
        assert_eq!(launched[0].resources.len(), 2);
    }

    #[test]
    fn stops_at_first_failure() {
        let pipeline = OfferEvaluationPipeline::new(vec![
            scalar(CPUS, 1.0),
            scalar(MEM, 512.0),
            scalar(CPUS, 0.1),
            EvaluationStage::Launch(LaunchStage),
        ]);
        let mut pool = ResourcePool::new(&offer(), ROLE);

        let result = pipeline.run(&mut pool, &mut builder());

        assert!(!result.outcome.is_passing());
        assert_eq!(result.stage_outcomes.len(), 2);
        assert_eq!(result.outcome.reason, result.stage_outcomes[1].reason);
        assert!(result.outcome.reason.contains("insufficient mem"));
        // the first stage's reservation is handed back for the caller to drop
        assert_eq!(result.outcome.recommendations.len(), 1);
    }
}
