//! ResourcePool - one offer's resources, consumed as stages evaluate.
//!
//! # Invariants
//! - every claim either reuses a reservation by id or consumes unreserved
//!   capacity; nothing handed out can be handed out again
//! - the pool is scoped to one (offer, pod) evaluation and never shared

use std::collections::BTreeMap;

use crate::domain::resource::scalar_covers;
use crate::domain::{AgentId, Offer, OfferId, Range, Resource, ResourceId, ResourceValue};

/// Amounts below this are treated as exhausted.
const EMPTY_SCALAR: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct ResourcePool {
    offer: Offer,
    /// Unreserved resources in offer order.
    unreserved: Vec<Resource>,
    /// Reservations of our role not yet claimed in this evaluation.
    reserved: BTreeMap<ResourceId, Resource>,
}

impl ResourcePool {
    /// Builds the pool for `offer`. Reserved resources of other roles are
    /// not ours to use and are left out entirely.
    pub fn new(offer: &Offer, role: &str) -> Self {
        let mut unreserved = Vec::new();
        let mut reserved = BTreeMap::new();
        for resource in &offer.resources {
            match &resource.reservation {
                None => unreserved.push(resource.clone()),
                Some(r) if r.role == role => {
                    reserved.insert(r.resource_id, resource.clone());
                }
                Some(_) => {}
            }
        }
        Self {
            offer: offer.clone(),
            unreserved,
            reserved,
        }
    }

    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    pub fn offer_id(&self) -> &OfferId {
        &self.offer.id
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.offer.agent_id
    }

    pub fn hostname(&self) -> &str {
        &self.offer.hostname
    }

    /// Reserved resources still unclaimed in this evaluation.
    pub fn reserved_pool(&self) -> &BTreeMap<ResourceId, Resource> {
        &self.reserved
    }

    pub fn unreserved(&self) -> &[Resource] {
        &self.unreserved
    }

    /// Takes the reserved resource carrying `resource_id`, if the offer has it.
    pub fn claim(&mut self, resource_id: &ResourceId) -> Option<Resource> {
        self.reserved.remove(resource_id)
    }

    /// Consumes unreserved capacity matching `value`.
    ///
    /// A scalar takes `amount` from the first resource large enough. A range
    /// value `[0, 0]` asks for any single value; any other range asks for
    /// exactly that range.
    pub fn find_matching(&mut self, name: &str, value: &ResourceValue) -> Option<Resource> {
        match value {
            ResourceValue::Scalar(amount) => self.find_matching_scalar(name, *amount),
            ResourceValue::Ranges(ranges) => {
                let [range] = ranges.as_slice() else {
                    return None;
                };
                if range.begin == 0 && range.end == 0 {
                    self.find_matching_range(name, 1)
                } else {
                    self.claim_range(name, *range)
                }
            }
        }
    }

    pub fn find_matching_scalar(&mut self, name: &str, amount: f64) -> Option<Resource> {
        let idx = self.unreserved.iter().position(|r| {
            r.name == name && r.scalar_value().is_some_and(|v| scalar_covers(v, amount))
        })?;
        let remaining = self.unreserved[idx].scalar_value().unwrap_or(0.0) - amount;
        if remaining < EMPTY_SCALAR {
            self.unreserved.remove(idx);
        } else {
            self.unreserved[idx].value = ResourceValue::Scalar(remaining);
        }
        Some(Resource::scalar(name, amount))
    }

    /// First-fit: the first block of at least `width` values, scanning
    /// resources and their ranges in offer order, is taken from its lower end.
    pub fn find_matching_range(&mut self, name: &str, width: u64) -> Option<Resource> {
        for resource in self.unreserved.iter_mut().filter(|r| r.name == name) {
            let ResourceValue::Ranges(ranges) = &mut resource.value else {
                continue;
            };
            let Some(pos) = ranges.iter().position(|r| r.width() >= width) else {
                continue;
            };
            let block = ranges[pos];
            let taken = Range::new(block.begin, block.begin + width - 1);
            if taken.end == block.end {
                ranges.remove(pos);
            } else {
                ranges[pos].begin = taken.end + 1;
            }
            return Some(Resource::ranges(name, vec![taken]));
        }
        None
    }

    /// Takes exactly `wanted` out of whichever unreserved range contains it.
    pub fn claim_range(&mut self, name: &str, wanted: Range) -> Option<Resource> {
        for resource in self.unreserved.iter_mut().filter(|r| r.name == name) {
            let ResourceValue::Ranges(ranges) = &mut resource.value else {
                continue;
            };
            let Some(pos) = ranges.iter().position(|r| r.contains(&wanted)) else {
                continue;
            };
            let block = ranges.remove(pos);
            let mut rest = Vec::with_capacity(2);
            if block.begin < wanted.begin {
                rest.push(Range::new(block.begin, wanted.begin - 1));
            }
            if wanted.end < block.end {
                rest.push(Range::new(wanted.end + 1, block.end));
            }
            for (i, r) in rest.into_iter().enumerate() {
                ranges.insert(pos + i, r);
            }
            return Some(Resource::ranges(name, vec![wanted]));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{CPUS, PORTS};
    use crate::domain::Reservation;
    use ulid::Ulid;

    const ROLE: &str = "test-role";

    fn reservation(role: &str) -> Reservation {
        Reservation {
            role: role.to_string(),
            principal: "p".to_string(),
            resource_id: ResourceId::from_ulid(Ulid::new()),
        }
    }

    fn ports_offer(ranges: Vec<Range>) -> Offer {
        Offer::new("offer-1", "agent-1", "host-1").with_resource(Resource::ranges(PORTS, ranges))
    }

    #[test]
    fn dynamic_port_takes_lower_bound_first_fit() {
        let offer = ports_offer(vec![Range::new(5000, 10000)]);
        let mut pool = ResourcePool::new(&offer, ROLE);

        let first = pool.find_matching_range(PORTS, 1).unwrap();
        let second = pool.find_matching_range(PORTS, 1).unwrap();
        assert_eq!(first.first_port(), Some(5000));
        assert_eq!(second.first_port(), Some(5001));
    }

    #[test]
    fn first_fit_skips_blocks_that_are_too_small() {
        let offer = ports_offer(vec![Range::new(100, 101), Range::new(200, 210)]);
        let mut pool = ResourcePool::new(&offer, ROLE);

        let taken = pool.find_matching_range(PORTS, 3).unwrap();
        assert_eq!(taken.range_values(), &[Range::new(200, 202)]);
        // the small block is untouched
        assert_eq!(pool.find_matching_range(PORTS, 2).unwrap().first_port(), Some(100));
    }

    #[test]
    fn known_port_splits_the_containing_range() {
        let offer = ports_offer(vec![Range::new(8000, 8010)]);
        let mut pool = ResourcePool::new(&offer, ROLE);

        assert!(pool.claim_range(PORTS, Range::single(8005)).is_some());
        assert!(pool.claim_range(PORTS, Range::single(8005)).is_none());
        assert_eq!(
            pool.unreserved()[0].range_values(),
            &[Range::new(8000, 8004), Range::new(8006, 8010)]
        );
    }

    #[test]
    fn scalars_are_consumed() {
        let offer = Offer::new("o", "a", "h").with_resource(Resource::scalar(CPUS, 2.0));
        let mut pool = ResourcePool::new(&offer, ROLE);

        assert!(pool.find_matching_scalar(CPUS, 1.5).is_some());
        assert!(pool.find_matching_scalar(CPUS, 1.0).is_none());
        assert!(pool.find_matching_scalar(CPUS, 0.5).is_some());
        assert!(pool.unreserved().is_empty());
    }

    #[test]
    fn claim_by_id_only_once_and_only_for_our_role() {
        let ours = reservation(ROLE);
        let theirs = reservation("other-role");
        let offer = Offer::new("o", "a", "h")
            .with_resource(Resource::scalar(CPUS, 1.0).reserved(ours.clone()))
            .with_resource(Resource::scalar(CPUS, 1.0).reserved(theirs.clone()));
        let mut pool = ResourcePool::new(&offer, ROLE);

        assert_eq!(pool.reserved_pool().len(), 1);
        assert!(pool.claim(&theirs.resource_id).is_none());
        assert!(pool.claim(&ours.resource_id).is_some());
        assert!(pool.claim(&ours.resource_id).is_none());
        assert!(pool.reserved_pool().is_empty());
        // reserved capacity never leaks into the unreserved pool
        assert!(pool.find_matching_scalar(CPUS, 0.5).is_none());
    }
}
