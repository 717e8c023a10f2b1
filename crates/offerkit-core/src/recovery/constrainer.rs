//! LaunchConstrainer - rate limits destructive relaunches.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::domain::{Operation, PodInstance, RecoveryType};
use crate::ports::{Clock, StateError, StateResult, StateStore, fetch_json_property, store_json_property};

pub const PROPERTY_KEY: &str = "launch-history";

/// # Implementations
/// - **UnconstrainedLaunchConstrainer**: always permits, records nothing
/// - **TimedLaunchConstrainer**: spaces PERMANENT launches of one pod instance
pub trait LaunchConstrainer: Send + Sync {
    fn can_launch(&self, pod_instance: &PodInstance, recovery_type: RecoveryType) -> bool;

    fn launch_happened(
        &self,
        pod_instance: &PodInstance,
        operation: &Operation,
        recovery_type: RecoveryType,
    ) -> StateResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnconstrainedLaunchConstrainer;

impl LaunchConstrainer for UnconstrainedLaunchConstrainer {
    fn can_launch(&self, _pod_instance: &PodInstance, _recovery_type: RecoveryType) -> bool {
        true
    }

    fn launch_happened(
        &self,
        _pod_instance: &PodInstance,
        _operation: &Operation,
        _recovery_type: RecoveryType,
    ) -> StateResult<()> {
        Ok(())
    }
}

/// Permits a PERMANENT launch of a pod instance only once `min_delay_ms`
/// has passed since its previous PERMANENT launch.
///
/// # Design
/// - NONE and TRANSIENT launches are never throttled and never recorded
/// - history is per pod instance name, in epoch milliseconds
/// - every recorded launch is written through to the `launch-history`
///   property, so the delay survives a scheduler restart
pub struct TimedLaunchConstrainer {
    min_delay_ms: i64,
    clock: Arc<dyn Clock>,
    state: Arc<dyn StateStore>,
    history: Mutex<BTreeMap<String, i64>>,
}

impl TimedLaunchConstrainer {
    /// Loads any launch history already persisted.
    pub fn load(
        min_delay_ms: i64,
        clock: Arc<dyn Clock>,
        state: Arc<dyn StateStore>,
    ) -> StateResult<Self> {
        let history = fetch_json_property(state.as_ref(), PROPERTY_KEY)?.unwrap_or_default();
        Ok(Self {
            min_delay_ms,
            clock,
            state,
            history: Mutex::new(history),
        })
    }

    fn history(&self) -> StateResult<MutexGuard<'_, BTreeMap<String, i64>>> {
        self.history
            .lock()
            .map_err(|e| StateError::Poisoned(e.to_string()))
    }

    pub fn last_launch_ms(&self, pod_instance: &PodInstance) -> Option<i64> {
        self.history().ok()?.get(&pod_instance.name()).copied()
    }
}

impl LaunchConstrainer for TimedLaunchConstrainer {
    fn can_launch(&self, pod_instance: &PodInstance, recovery_type: RecoveryType) -> bool {
        if recovery_type != RecoveryType::Permanent {
            return true;
        }
        match self.last_launch_ms(pod_instance) {
            None => true,
            // the delay must be strictly past
            Some(last) => self.clock.now_millis() > last.saturating_add(self.min_delay_ms),
        }
    }

    fn launch_happened(
        &self,
        pod_instance: &PodInstance,
        operation: &Operation,
        recovery_type: RecoveryType,
    ) -> StateResult<()> {
        if recovery_type != RecoveryType::Permanent
            || !matches!(operation, Operation::LaunchGroup { .. })
        {
            return Ok(());
        }
        let now = self.clock.now_millis();
        let mut history = self.history()?;
        history.insert(pod_instance.name(), now);
        store_json_property(self.state.as_ref(), PROPERTY_KEY, &*history)?;
        debug!(pod = %pod_instance, at_ms = now, "recorded permanent launch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PodSpec, TaskSpec};
    use crate::impls::InMemoryStateStore;
    use crate::ports::FixedClock;
    use rstest::rstest;

    const MIN_DELAY_MS: i64 = 3_000;

    fn instance(index: u32) -> PodInstance {
        PodInstance::new(
            PodSpec {
                pod_type: "node".to_string(),
                count: 2,
                sticky: true,
                placement: None,
                executor: None,
                tasks: vec![TaskSpec::new("server", "./server")],
            },
            index,
        )
    }

    fn launch() -> Operation {
        Operation::LaunchGroup {
            executor: None,
            tasks: Vec::new(),
        }
    }

    fn constrainer(clock: Arc<FixedClock>, state: Arc<dyn StateStore>) -> TimedLaunchConstrainer {
        TimedLaunchConstrainer::load(MIN_DELAY_MS, clock, state).unwrap()
    }

    #[rstest]
    #[case::none_after_none(RecoveryType::None, RecoveryType::None, true)]
    #[case::transient_after_none(RecoveryType::None, RecoveryType::Transient, true)]
    #[case::permanent_after_none(RecoveryType::None, RecoveryType::Permanent, true)]
    #[case::none_after_transient(RecoveryType::Transient, RecoveryType::None, true)]
    #[case::permanent_after_transient(RecoveryType::Transient, RecoveryType::Permanent, true)]
    #[case::transient_after_transient(RecoveryType::Transient, RecoveryType::Transient, true)]
    #[case::none_after_permanent(RecoveryType::Permanent, RecoveryType::None, true)]
    #[case::transient_after_permanent(RecoveryType::Permanent, RecoveryType::Transient, true)]
    #[case::permanent_after_permanent(RecoveryType::Permanent, RecoveryType::Permanent, false)]
    fn only_permanent_after_permanent_waits(
        #[case] happened: RecoveryType,
        #[case] next: RecoveryType,
        #[case] expected: bool,
    ) {
        let c = constrainer(Arc::new(FixedClock::from_millis(10_000)), Arc::new(InMemoryStateStore::new()));
        c.launch_happened(&instance(0), &launch(), happened).unwrap();
        assert_eq!(c.can_launch(&instance(0), next), expected);
    }

    #[test]
    fn permanent_launch_allowed_once_delay_passed() {
        let clock = Arc::new(FixedClock::from_millis(10_000));
        let c = constrainer(clock.clone(), Arc::new(InMemoryStateStore::new()));
        c.launch_happened(&instance(0), &launch(), RecoveryType::Permanent).unwrap();

        assert!(!c.can_launch(&instance(0), RecoveryType::Permanent));
        clock.advance_millis(MIN_DELAY_MS - 1);
        assert!(!c.can_launch(&instance(0), RecoveryType::Permanent));
        // exactly at the boundary is still too early
        clock.advance_millis(1);
        assert!(!c.can_launch(&instance(0), RecoveryType::Permanent));
        clock.advance_millis(1);
        assert!(c.can_launch(&instance(0), RecoveryType::Permanent));
    }

    #[test]
    fn history_is_per_instance() {
        let c = constrainer(Arc::new(FixedClock::from_millis(0)), Arc::new(InMemoryStateStore::new()));
        c.launch_happened(&instance(0), &launch(), RecoveryType::Permanent).unwrap();
        assert!(!c.can_launch(&instance(0), RecoveryType::Permanent));
        assert!(c.can_launch(&instance(1), RecoveryType::Permanent));
    }

    #[test]
    fn history_survives_a_restart() {
        let clock = Arc::new(FixedClock::from_millis(50_000));
        let state: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        constrainer(clock.clone(), state.clone())
            .launch_happened(&instance(0), &launch(), RecoveryType::Permanent)
            .unwrap();

        let reloaded = constrainer(clock, state);
        assert_eq!(reloaded.last_launch_ms(&instance(0)), Some(50_000));
        assert!(!reloaded.can_launch(&instance(0), RecoveryType::Permanent));
    }

    #[test]
    fn unconstrained_records_nothing() {
        let c = UnconstrainedLaunchConstrainer;
        c.launch_happened(&instance(0), &launch(), RecoveryType::Permanent).unwrap();
        assert!(c.can_launch(&instance(0), RecoveryType::Permanent));
    }
}
