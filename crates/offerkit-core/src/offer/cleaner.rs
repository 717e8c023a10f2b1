//! Releases reservations no stored task refers to any more.

use std::collections::BTreeSet;

use tracing::info;

use crate::domain::resource::DISK;
use crate::domain::{Offer, OfferRecommendation, Operation, ResourceId, TaskInfo};

pub struct ResourceCleaner {
    role: String,
    expected: BTreeSet<ResourceId>,
}

impl ResourceCleaner {
    /// `tasks` is every TaskInfo in the state store. Their resources (and
    /// their executors') are the reservations still in use.
    pub fn new(role: impl Into<String>, tasks: &[TaskInfo]) -> Self {
        let expected = tasks
            .iter()
            .flat_map(TaskInfo::all_resources)
            .filter_map(|r| r.resource_id())
            .collect();
        Self {
            role: role.into(),
            expected,
        }
    }

    /// Destroy for every orphaned volume, then Unreserve for every orphaned
    /// reservation of our role. Empty when the offer holds nothing to clean.
    pub fn clean(&self, offer: &Offer) -> Vec<OfferRecommendation> {
        let orphans: Vec<_> = offer
            .resources
            .iter()
            .filter(|r| {
                r.reservation
                    .as_ref()
                    .is_some_and(|res| res.role == self.role && !self.expected.contains(&res.resource_id))
            })
            .collect();
        if orphans.is_empty() {
            return Vec::new();
        }

        let volumes: Vec<_> = orphans
            .iter()
            .filter(|r| r.name == DISK && r.disk.is_some())
            .map(|r| (*r).clone())
            .collect();
        let mut recommendations = Vec::with_capacity(2);
        if !volumes.is_empty() {
            recommendations.push(OfferRecommendation::new(
                offer.id.clone(),
                offer.agent_id.clone(),
                Operation::Destroy { volumes },
            ));
        }
        recommendations.push(OfferRecommendation::new(
            offer.id.clone(),
            offer.agent_id.clone(),
            Operation::Unreserve {
                resources: orphans.into_iter().cloned().collect(),
            },
        ));
        info!(
            offer = %offer.id,
            host = %offer.hostname,
            operations = recommendations.len(),
            "releasing orphaned reservations"
        );
        recommendations
    }
}
