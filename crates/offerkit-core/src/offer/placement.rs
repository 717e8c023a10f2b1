//! Placement rules: offer filters consulted before any resource is claimed.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::domain::{Offer, PlacementSpec, PodInstance, TaskInfo};

use super::EvaluationOutcome;

pub(crate) const NAME: &str = "placement";

/// Extension point: decides whether `pod_instance` may land on `offer`'s
/// agent given every task currently stored.
pub trait PlacementRule: Send + Sync + fmt::Debug {
    fn filter(&self, offer: &Offer, pod_instance: &PodInstance, tasks: &[TaskInfo]) -> EvaluationOutcome;
}

/// Rule for a declared `PlacementSpec`.
pub fn rule_for(spec: &PlacementSpec) -> Arc<dyn PlacementRule> {
    match spec {
        PlacementSpec::Hostname { avoid, require } => Arc::new(HostnameRule {
            avoid: avoid.clone(),
            require: require.clone(),
        }),
        PlacementSpec::MaxPerHostname { max } => Arc::new(MaxPerHostnameRule { max: *max }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameRule {
    pub avoid: Vec<String>,
    /// Empty means any hostname not avoided.
    pub require: Vec<String>,
}

impl PlacementRule for HostnameRule {
    fn filter(&self, offer: &Offer, _pod: &PodInstance, _tasks: &[TaskInfo]) -> EvaluationOutcome {
        let host = &offer.hostname;
        if self.avoid.iter().any(|h| h == host) {
            return EvaluationOutcome::fail(NAME, format!("hostname {host} is avoided"));
        }
        if !self.require.is_empty() && !self.require.iter().any(|h| h == host) {
            return EvaluationOutcome::fail(NAME, format!("hostname {host} is not in the required set"));
        }
        EvaluationOutcome::pass(NAME, format!("hostname {host} accepted"))
    }
}

/// At most `max` instances of one pod type per hostname. The instance being
/// placed does not count against itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPerHostnameRule {
    pub max: u32,
}

impl PlacementRule for MaxPerHostnameRule {
    fn filter(&self, offer: &Offer, pod: &PodInstance, tasks: &[TaskInfo]) -> EvaluationOutcome {
        let pod_type = pod.pod.pod_type.as_str();
        let instances: HashSet<u32> = tasks
            .iter()
            .filter(|t| t.hostname == offer.hostname)
            .filter(|t| t.pod_type().is_ok_and(|p| p == pod_type))
            .filter_map(|t| t.pod_index().ok())
            .filter(|index| *index != pod.index)
            .collect();
        if instances.len() as u32 >= self.max {
            return EvaluationOutcome::fail(
                NAME,
                format!(
                    "{} already hosts {} '{pod_type}' instances (max {})",
                    offer.hostname,
                    instances.len(),
                    self.max
                ),
            );
        }
        EvaluationOutcome::pass(NAME, format!("{} has room for '{pod_type}'", offer.hostname))
    }
}
