//! Scalar resource stage (cpus, mem, disk).

use tracing::debug;

use crate::domain::resource::scalar_covers;
use crate::domain::{OfferRecommendation, Operation, Resource, ResourceId, ResourceValue};
use crate::offer::pod_builder::{BuildTarget, PodInfoBuilder};
use crate::offer::pool::ResourcePool;
use crate::offer::EvaluationOutcome;

use super::ReservationTemplate;

pub(crate) const NAME: &str = "resource";

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceStage {
    pub target: BuildTarget,
    pub name: String,
    pub amount: f64,
    /// Reservation to reuse, from the previous launch of this task.
    pub expected_id: Option<ResourceId>,
    pub reservation: ReservationTemplate,
}

impl ResourceStage {
    pub fn evaluate(&self, pool: &mut ResourcePool, builder: &mut PodInfoBuilder) -> EvaluationOutcome {
        let (resolved, operations) = match self.expected_id {
            Some(id) => match self.reuse(pool, id) {
                Ok(r) => r,
                Err(reason) => return EvaluationOutcome::fail(NAME, reason),
            },
            None => match pool.find_matching_scalar(&self.name, self.amount) {
                Some(found) => {
                    let id = builder.ids().resource_id();
                    let reserved = found.reserved(self.reservation.with_id(id));
                    let op = Operation::Reserve {
                        resources: vec![reserved.clone()],
                    };
                    (reserved, vec![op])
                }
                None => {
                    return EvaluationOutcome::fail(
                        NAME,
                        format!("insufficient {}: requested {}", self.name, self.amount),
                    );
                }
            },
        };

        if !builder.add_resource(&self.target, resolved) {
            return EvaluationOutcome::fail(NAME, format!("unknown target {:?}", self.target));
        }
        let recommendations = operations
            .into_iter()
            .map(|op| OfferRecommendation::new(pool.offer_id().clone(), pool.agent_id().clone(), op))
            .collect::<Vec<_>>();
        let reason = if recommendations.is_empty() {
            format!("reused reserved {} {}", self.amount, self.name)
        } else {
            format!("reserved {} {}", self.amount, self.name)
        };
        EvaluationOutcome::pass(NAME, reason).with_recommendations(recommendations)
    }

    /// Claims the known reservation and resizes it to the wanted amount:
    /// growth reserves the delta, shrinkage unreserves it.
    fn reuse(
        &self,
        pool: &mut ResourcePool,
        id: ResourceId,
    ) -> Result<(Resource, Vec<Operation>), String> {
        let existing = pool
            .claim(&id)
            .ok_or_else(|| format!("offer lacks reserved {} with id {id}", self.name))?;
        let have = existing.scalar_value().unwrap_or(0.0);
        let reservation = existing
            .reservation
            .clone()
            .unwrap_or_else(|| self.reservation.with_id(id));

        let mut resolved = existing;
        resolved.value = ResourceValue::Scalar(self.amount);

        if scalar_covers(have, self.amount) && scalar_covers(self.amount, have) {
            return Ok((resolved, Vec::new()));
        }
        if self.amount > have {
            let delta = self.amount - have;
            let extra = pool.find_matching_scalar(&self.name, delta).ok_or_else(|| {
                format!(
                    "insufficient {} to grow reservation {id} from {have} to {}",
                    self.name, self.amount
                )
            })?;
            debug!(resource = %self.name, %id, have, want = self.amount, "growing reservation");
            let op = Operation::Reserve {
                resources: vec![extra.reserved(reservation)],
            };
            Ok((resolved, vec![op]))
        } else {
            let delta = Resource::scalar(self.name.clone(), have - self.amount).reserved(reservation);
            debug!(resource = %self.name, %id, have, want = self.amount, "shrinking reservation");
            Ok((resolved, vec![Operation::Unreserve { resources: vec![delta] }]))
        }
    }
}
