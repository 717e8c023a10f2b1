//! SchedulerBuilder - wiring and startup validation.
//!
//! # Fail-fast
//! Everything that can be checked before the first offer arrives is checked
//! in `build()`: the configuration, the service spec, and the deploy plan
//! (strategy names, dependency cycles). A scheduler that builds never fails
//! on its own definition later.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::domain::{ConfigId, ServiceSpec, SpecValidationError};
use crate::impls::{InMemoryConfigStore, InMemoryStateStore};
use crate::offer::{OfferEvaluator, ReservationTemplate};
use crate::plan::{DefaultReconciler, PlanBuilder, PlanError, PlanOverrides, Reconciler};
use crate::ports::{
    Clock, ConfigStore, IdGenerator, StateError, StateResult, StateStore, SystemClock,
    UlidGenerator,
};
use crate::recovery::{
    DefaultFailureMonitor, FailureMonitor, LaunchConstrainer, RecoveryPlanManager,
    TimedFailureMonitor, TimedLaunchConstrainer, UnconstrainedLaunchConstrainer,
};

use super::config::{ConfigError, SchedulerConfig};
use super::scheduler::DefaultScheduler;

/// BuildError is returned when the scheduler cannot start.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid service spec: {0}")]
    Spec(#[from] SpecValidationError),

    #[error("invalid deploy plan: {0}")]
    Plan(#[from] PlanError),

    #[error("cannot load scheduler state: {0}")]
    State(#[from] StateError),
}

/// # Example
/// ```ignore
/// let scheduler = SchedulerBuilder::new(spec)
///     .config(SchedulerConfig::load("offerkit.toml")?)
///     .state_store(state)
///     .build()?;
/// ```
///
/// Unset collaborators default to in-memory stores, the system clock and
/// ULID ids.
pub struct SchedulerBuilder {
    spec: ServiceSpec,
    config: SchedulerConfig,
    state: Option<Arc<dyn StateStore>>,
    configs: Option<Arc<dyn ConfigStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    failure_monitor: Option<Arc<dyn FailureMonitor>>,
}

impl SchedulerBuilder {
    pub fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            config: SchedulerConfig::default(),
            state: None,
            configs: None,
            clock: None,
            ids: None,
            failure_monitor: None,
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state_store(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn config_store(mut self, configs: Arc<dyn ConfigStore>) -> Self {
        self.configs = Some(configs);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Replaces the monitor derived from `recovery.permanent_failure_timeout_ms`.
    pub fn failure_monitor(mut self, monitor: Arc<dyn FailureMonitor>) -> Self {
        self.failure_monitor = Some(monitor);
        self
    }

    pub fn build(self) -> Result<DefaultScheduler, BuildError> {
        self.config.validate()?;
        let spec = self.config.apply(&self.spec);
        spec.validate()?;

        let mut plan = PlanBuilder::new(&spec).plan_strategy(self.config.plan.strategy.clone());
        for (pod_type, strategy) in &self.config.plan.phases {
            plan = plan.phase_strategy(pod_type.clone(), strategy.clone());
        }
        let plan = plan.build()?;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        let state: Arc<dyn StateStore> = match self.state {
            Some(state) => state,
            None => Arc::new(InMemoryStateStore::new()),
        };
        let configs: Arc<dyn ConfigStore> = match self.configs {
            Some(configs) => configs,
            None => Arc::new(InMemoryConfigStore::new(Arc::clone(&ids))),
        };

        let target = target_configuration(configs.as_ref(), &spec)?;

        let recovery = &self.config.recovery;
        let monitor: Arc<dyn FailureMonitor> =
            match (self.failure_monitor, recovery.permanent_failure_timeout_ms) {
                (Some(monitor), _) => monitor,
                (None, Some(grace_ms)) => Arc::new(TimedFailureMonitor::new(
                    DefaultFailureMonitor::new(Arc::clone(&configs)),
                    Arc::clone(&clock),
                    millis(grace_ms),
                )),
                (None, None) => Arc::new(DefaultFailureMonitor::new(Arc::clone(&configs))),
            };
        let constrainer: Arc<dyn LaunchConstrainer> = if recovery.launch_constrainer_enabled {
            Arc::new(TimedLaunchConstrainer::load(
                millis(recovery.min_launch_delay_ms),
                Arc::clone(&clock),
                Arc::clone(&state),
            )?)
        } else {
            Arc::new(UnconstrainedLaunchConstrainer)
        };

        let mut reconciler = DefaultReconciler::new(self.config.reconciliation.backoff());
        reconciler.start(state.fetch_statuses()?);

        info!(
            service = %spec.name,
            target = %target,
            phases = plan.phases().len(),
            "scheduler built"
        );
        Ok(DefaultScheduler {
            overrides: PlanOverrides::load(state.as_ref())?,
            evaluator: OfferEvaluator::new(
                Arc::clone(&state),
                ids,
                ReservationTemplate::new(spec.role.clone(), spec.principal.clone()),
            ),
            recovery: RecoveryPlanManager::new(Arc::clone(&state), monitor, constrainer),
            reconciler: Box::new(reconciler),
            spec,
            target,
            plan,
            state,
            clock,
            killing: Default::default(),
        })
    }
}

/// Reuses the stored target when it matches `spec`; otherwise stores `spec`
/// as a new target, which makes every step of an older one PENDING again.
fn target_configuration(configs: &dyn ConfigStore, spec: &ServiceSpec) -> StateResult<ConfigId> {
    if let Some(current) = configs.target()? {
        if configs.fetch(&current)? == *spec {
            return Ok(current);
        }
    }
    let id = configs.store(spec)?;
    configs.set_target(id)?;
    info!(target = %id, "stored new target configuration");
    Ok(id)
}

fn millis(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
