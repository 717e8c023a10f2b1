//! Persistent volume stage: reserved disk plus a `Create` operation.

use crate::domain::resource::DISK;
use crate::domain::{DiskInfo, OfferRecommendation, Operation, ResourceId};
use crate::offer::pod_builder::{BuildTarget, PodInfoBuilder};
use crate::offer::pool::ResourcePool;
use crate::offer::EvaluationOutcome;

use super::ReservationTemplate;

pub(crate) const NAME: &str = "volume";

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeStage {
    pub target: BuildTarget,
    pub container_path: String,
    pub size_mb: f64,
    /// Reservation of the existing volume.
    pub expected_id: Option<ResourceId>,
    pub reservation: ReservationTemplate,
}

impl VolumeStage {
    pub fn evaluate(&self, pool: &mut ResourcePool, builder: &mut PodInfoBuilder) -> EvaluationOutcome {
        if let Some(id) = self.expected_id {
            let Some(existing) = pool.claim(&id) else {
                return EvaluationOutcome::fail(
                    NAME,
                    format!("offer lacks volume '{}' with id {id}", self.container_path),
                );
            };
            if existing.disk.is_none() {
                return EvaluationOutcome::fail(
                    NAME,
                    format!("reserved disk {id} carries no volume for '{}'", self.container_path),
                );
            }
            if !builder.add_resource(&self.target, existing) {
                return EvaluationOutcome::fail(NAME, format!("unknown target {:?}", self.target));
            }
            return EvaluationOutcome::pass(NAME, format!("reused volume '{}'", self.container_path));
        }

        let Some(disk) = pool.find_matching_scalar(DISK, self.size_mb) else {
            return EvaluationOutcome::fail(
                NAME,
                format!(
                    "insufficient disk for volume '{}': requested {}",
                    self.container_path, self.size_mb
                ),
            );
        };
        let reserved = disk.reserved(self.reservation.with_id(builder.ids().resource_id()));
        let volume = reserved.clone().with_disk(DiskInfo {
            persistence_id: builder.ids().persistence_id(),
            container_path: self.container_path.clone(),
        });

        if !builder.add_resource(&self.target, volume.clone()) {
            return EvaluationOutcome::fail(NAME, format!("unknown target {:?}", self.target));
        }
        let recommendation = |operation| {
            OfferRecommendation::new(pool.offer_id().clone(), pool.agent_id().clone(), operation)
        };
        let recommendations = vec![
            recommendation(Operation::Reserve {
                resources: vec![reserved],
            }),
            recommendation(Operation::Create {
                volumes: vec![volume],
            }),
        ];
        EvaluationOutcome::pass(NAME, format!("created volume '{}'", self.container_path))
            .with_recommendations(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Offer, Resource};
    use crate::offer::stage::test_support::{builder, template, ROLE};
    use ulid::Ulid;

    fn stage(expected_id: Option<ResourceId>) -> VolumeStage {
        VolumeStage {
            target: BuildTarget::Task("server".to_string()),
            container_path: "data".to_string(),
            size_mb: 1024.0,
            expected_id,
            reservation: template(),
        }
    }

    #[test]
    fn new_volume_reserves_then_creates() {
        let offer = Offer::new("o", "a", "h").with_resource(Resource::scalar(DISK, 4096.0));
        let mut pool = ResourcePool::new(&offer, ROLE);
        let mut b = builder();

        let outcome = stage(None).evaluate(&mut pool, &mut b);

        assert!(outcome.is_passing());
        let kinds: Vec<_> = outcome.recommendations.iter().map(|r| r.operation.kind()).collect();
        assert_eq!(kinds, vec!["RESERVE", "CREATE"]);
        let volume = &b.task("server").unwrap().resources[0];
        assert_eq!(volume.disk.as_ref().unwrap().container_path, "data");
    }

    #[test]
    fn existing_volume_is_reused_silently() {
        let id = ResourceId::from_ulid(Ulid::new());
        let volume = Resource::scalar(DISK, 1024.0)
            .reserved(template().with_id(id))
            .with_disk(DiskInfo {
                persistence_id: crate::domain::PersistenceId::from_ulid(Ulid::new()),
                container_path: "data".to_string(),
            });
        let offer = Offer::new("o", "a", "h").with_resource(volume.clone());
        let mut pool = ResourcePool::new(&offer, ROLE);
        let mut b = builder();

        let outcome = stage(Some(id)).evaluate(&mut pool, &mut b);

        assert!(outcome.is_passing());
        assert!(outcome.recommendations.is_empty());
        assert_eq!(b.task("server").unwrap().resources, vec![volume]);
    }

    #[test]
    fn unknown_target_fails_without_operations() {
        let offer = Offer::new("o", "a", "h").with_resource(Resource::scalar(DISK, 4096.0));
        let mut pool = ResourcePool::new(&offer, ROLE);
        let mut b = builder();
        let stage = VolumeStage {
            target: BuildTarget::Task("missing".to_string()),
            ..stage(None)
        };

        let outcome = stage.evaluate(&mut pool, &mut b);

        assert!(!outcome.is_passing());
        assert!(outcome.recommendations.is_empty());
        assert!(b.task("server").unwrap().resources.is_empty());
    }
}
