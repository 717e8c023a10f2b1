//! Operator overrides: interrupt/resume, restart and force-complete.
//!
//! Persisted as the `plan-overrides` property so they survive a restart.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::Status;
use crate::ports::{StateResult, StateStore, fetch_json_property, store_json_property};

pub const PROPERTY_KEY: &str = "plan-overrides";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOverride {
    /// PENDING until the step is launched again.
    Restart,
    /// COMPLETE unless its tasks are running or failing.
    ForceComplete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOverrides {
    /// Interrupted plan and phase names.
    #[serde(default)]
    interrupted: BTreeSet<String>,
    /// Keyed by step name.
    #[serde(default)]
    steps: BTreeMap<String, StepOverride>,
}

impl PlanOverrides {
    pub fn load(state: &dyn StateStore) -> StateResult<Self> {
        Ok(fetch_json_property(state, PROPERTY_KEY)?.unwrap_or_default())
    }

    pub fn save(&self, state: &dyn StateStore) -> StateResult<()> {
        store_json_property(state, PROPERTY_KEY, self)
    }

    pub fn interrupt(&mut self, element: &str) {
        self.interrupted.insert(element.to_string());
    }

    /// Returns false if `element` was not interrupted.
    pub fn resume(&mut self, element: &str) -> bool {
        self.interrupted.remove(element)
    }

    pub fn is_interrupted(&self, element: &str) -> bool {
        self.interrupted.contains(element)
    }

    pub fn set(&mut self, step: &str, value: StepOverride) {
        self.steps.insert(step.to_string(), value);
    }

    /// Returns true if an override was removed.
    pub fn clear(&mut self, step: &str) -> bool {
        self.steps.remove(step).is_some()
    }

    pub fn get(&self, step: &str) -> Option<StepOverride> {
        self.steps.get(step).copied()
    }

    /// Applies the override of `step` to its derived status.
    ///
    /// A forced completion never hides a task that is running or failing.
    pub fn apply(&self, step: &str, derived: Status) -> Status {
        match self.get(step) {
            None => derived,
            Some(StepOverride::Restart) => Status::Pending,
            Some(StepOverride::ForceComplete) => match derived {
                Status::InProgress | Status::Error => derived,
                _ => Status::Complete,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryStateStore;
    use rstest::rstest;

    #[rstest]
    #[case::none(None, Status::Error, Status::Error)]
    #[case::restart_complete(Some(StepOverride::Restart), Status::Complete, Status::Pending)]
    #[case::restart_error(Some(StepOverride::Restart), Status::Error, Status::Pending)]
    #[case::force_pending(Some(StepOverride::ForceComplete), Status::Pending, Status::Complete)]
    #[case::force_prepared(Some(StepOverride::ForceComplete), Status::Prepared, Status::Complete)]
    #[case::force_running(Some(StepOverride::ForceComplete), Status::InProgress, Status::InProgress)]
    #[case::force_failing(Some(StepOverride::ForceComplete), Status::Error, Status::Error)]
    fn apply_respects_running_tasks(
        #[case] value: Option<StepOverride>,
        #[case] derived: Status,
        #[case] expected: Status,
    ) {
        let mut overrides = PlanOverrides::default();
        if let Some(v) = value {
            overrides.set("node-0", v);
        }
        assert_eq!(overrides.apply("node-0", derived), expected);
        assert_eq!(overrides.apply("other", derived), derived);
    }

    #[test]
    fn survives_a_round_trip_through_the_store() {
        let state = InMemoryStateStore::new();
        assert_eq!(PlanOverrides::load(&state).unwrap(), PlanOverrides::default());

        let mut overrides = PlanOverrides::default();
        overrides.interrupt("node");
        overrides.set("node-1", StepOverride::ForceComplete);
        overrides.save(&state).unwrap();

        let loaded = PlanOverrides::load(&state).unwrap();
        assert!(loaded.is_interrupted("node"));
        assert_eq!(loaded.get("node-1"), Some(StepOverride::ForceComplete));
    }

    #[test]
    fn resume_and_clear_report_changes() {
        let mut overrides = PlanOverrides::default();
        assert!(!overrides.resume("deploy"));
        overrides.interrupt("deploy");
        assert!(overrides.resume("deploy"));
        assert!(!overrides.clear("node-0"));
    }
}
