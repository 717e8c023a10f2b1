//! DefaultScheduler - the synchronous decision core.
//!
//! Owns the deploy plan, the operator overrides and the recovery
//! bookkeeping. Every call runs to completion before the next one starts;
//! `event_loop` serializes offers, status updates and commands into it and
//! carries the resulting decisions to the cluster.
//!
//! # Scheduling pass (`resource_offers`)
//! 1. derive the plan snapshot from persisted state
//! 2. collect eligible deploy steps, then recovery steps for pod instances
//!    the deploy plan is not working on
//! 3. a pod instance with tasks still running is not launched; those tasks
//!    are killed first
//! 4. evaluate each requirement against the offers not used yet this pass
//! 5. persist launched TaskInfos before the decisions leave the core
//! 6. release orphaned reservations on unused offers, decline the rest

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::{
    ConfigId, Offer, OfferId, Operation, PodInstanceRequirement, ServiceSpec, Status, TaskId,
    TaskStatus,
};
use crate::error::{ErrorKind, SchedulerResult};
use crate::offer::{EvaluationResult, OfferEvaluator, ResourceCleaner};
use crate::plan::step::deploy_step_status;
use crate::plan::{Plan, PlanError, PlanOverrides, PlanSnapshot, Reconciler, Step, StepKind, StepOverride};
use crate::ports::{Clock, ReconcileRequest, StateStore};
use crate::recovery::{RecoveryPlanManager, RecoveryStepView};

use super::status::{SchedulerStatus, TaskCounts};

/// Operations to apply to one offer.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedOffer {
    pub offer_id: OfferId,
    pub operations: Vec<Operation>,
}

/// Result of one scheduling pass. Every offer of the pass is either
/// accepted or declined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferDecisions {
    pub accepted: Vec<AcceptedOffer>,
    pub declined: Vec<OfferId>,
    /// Tasks that must stop before their pod instance is relaunched.
    pub kills: Vec<TaskId>,
}

impl OfferDecisions {
    /// Number of LaunchGroup operations across accepted offers.
    pub fn launches(&self) -> usize {
        self.accepted
            .iter()
            .flat_map(|a| &a.operations)
            .filter(|op| matches!(op, Operation::LaunchGroup { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Deploy,
    Recovery,
}

impl Origin {
    fn as_str(self) -> &'static str {
        match self {
            Origin::Deploy => "deploy",
            Origin::Recovery => "recovery",
        }
    }
}

struct Work {
    origin: Origin,
    requirement: PodInstanceRequirement,
    permitted: bool,
}

pub struct DefaultScheduler {
    pub(super) spec: ServiceSpec,
    pub(super) target: ConfigId,
    pub(super) plan: Plan,
    pub(super) overrides: PlanOverrides,
    pub(super) evaluator: OfferEvaluator,
    pub(super) recovery: RecoveryPlanManager,
    pub(super) reconciler: Box<dyn Reconciler>,
    pub(super) state: Arc<dyn StateStore>,
    pub(super) clock: Arc<dyn Clock>,
    /// Kills already requested and not yet confirmed by a terminal status.
    pub(super) killing: BTreeSet<TaskId>,
}

impl DefaultScheduler {
    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    pub fn target(&self) -> ConfigId {
        self.target
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciler.is_reconciled()
    }

    /// Status tree of the deploy plan as of now.
    pub fn snapshot(&self) -> SchedulerResult<PlanSnapshot> {
        let reconciliation = self.reconciler.status();
        self.plan.snapshot(&self.overrides, |step| match &step.kind {
            StepKind::Reconciliation => Ok(reconciliation),
            StepKind::Deploy(requirement) => {
                match deploy_step_status(requirement, self.target, self.state.as_ref()) {
                    Err(e) if e.kind() == ErrorKind::Corruption => {
                        warn!(step = %step.name, error = %e, "stored task is unreadable");
                        Ok(Status::Error)
                    }
                    other => other,
                }
            }
        })
    }

    /// Runs one scheduling pass over `offers`.
    pub fn resource_offers(&mut self, offers: Vec<Offer>) -> SchedulerResult<OfferDecisions> {
        let snapshot = self.snapshot()?;
        let work = self.pending_work(&snapshot)?;
        let mut decisions = OfferDecisions::default();
        let mut remaining = offers;

        for item in work {
            let pod = item.requirement.pod_instance.name();
            let active = self.active_tasks(&item.requirement)?;
            if !active.is_empty() {
                debug!(pod = %pod, tasks = active.len(), "waiting for running tasks to stop");
                decisions.kills.extend(self.request_kills(active));
                continue;
            }
            if !item.permitted || remaining.is_empty() {
                continue;
            }

            let candidates: Vec<&Offer> = remaining.iter().collect();
            let result = match self.evaluator.evaluate(&item.requirement, self.target, &candidates) {
                Ok(Some(result)) => result,
                Ok(None) => {
                    debug!(pod = %pod, offers = candidates.len(), "no offer satisfies pod");
                    continue;
                }
                Err(e) if e.kind() != ErrorKind::Infrastructure => {
                    error!(pod = %pod, error = %e, "cannot evaluate pod");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.record_launch(&item, &result)?;
            remaining.retain(|o| o.id != result.offer_id);
            decisions.accepted.push(AcceptedOffer {
                offer_id: result.offer_id,
                operations: result
                    .recommendations
                    .into_iter()
                    .map(|r| r.operation)
                    .collect(),
            });
        }

        let cleaner = ResourceCleaner::new(&self.spec.role, &self.state.fetch_tasks()?);
        for offer in remaining {
            let cleanup = cleaner.clean(&offer);
            if cleanup.is_empty() {
                decisions.declined.push(offer.id);
            } else {
                decisions.accepted.push(AcceptedOffer {
                    offer_id: offer.id,
                    operations: cleanup.into_iter().map(|r| r.operation).collect(),
                });
            }
        }
        Ok(decisions)
    }

    fn pending_work(&self, snapshot: &PlanSnapshot) -> SchedulerResult<Vec<Work>> {
        let mut work = Vec::new();
        for at in snapshot.eligible(&self.plan, &BTreeSet::new()) {
            if let Some(requirement) = self.plan.step(at).and_then(Step::requirement) {
                work.push(Work {
                    origin: Origin::Deploy,
                    requirement: requirement.clone(),
                    permitted: true,
                });
            }
        }
        // statuses may be stale until reconciled
        if self.reconciler.is_reconciled() {
            let dirty = snapshot.in_flight_assets(&self.plan);
            for step in self.recovery.steps(&self.spec, &dirty)? {
                work.push(Work {
                    origin: Origin::Recovery,
                    requirement: step.requirement,
                    permitted: step.permitted,
                });
            }
        }
        Ok(work)
    }

    /// Current attempts of the requirement's tasks that have not stopped.
    fn active_tasks(&self, requirement: &PodInstanceRequirement) -> SchedulerResult<Vec<TaskId>> {
        let mut active = Vec::new();
        for name in requirement.full_task_names() {
            let (Some(task), Some(status)) =
                (self.state.fetch_task(&name)?, self.state.fetch_status(&name)?)
            else {
                continue;
            };
            if status.task_id == task.task_id && !status.state.is_terminal() {
                active.push(task.task_id);
            }
        }
        Ok(active)
    }

    /// Kills not requested before.
    fn request_kills(&mut self, task_ids: Vec<TaskId>) -> Vec<TaskId> {
        task_ids
            .into_iter()
            .filter(|id| self.killing.insert(*id))
            .collect()
    }

    fn record_launch(&mut self, item: &Work, result: &EvaluationResult) -> SchedulerResult<()> {
        let launched = result.launched_tasks();
        self.state.store_tasks(&launched)?;

        let pod = item.requirement.pod_instance.name();
        if self.overrides.get(&pod) == Some(StepOverride::Restart) {
            self.overrides.clear(&pod);
            self.overrides.save(self.state.as_ref())?;
        }
        self.recovery
            .launched(&item.requirement, &result.recommendations)?;
        info!(
            pod = %pod,
            origin = item.origin.as_str(),
            recovery = ?item.requirement.recovery_type,
            offer = %result.offer_id,
            tasks = launched.len(),
            "launching pod"
        );
        Ok(())
    }

    /// Records a status from the cluster manager.
    ///
    /// Statuses of attempts the store no longer knows (an earlier launch of
    /// a relaunched task, or a task we never launched) are dropped.
    pub fn status_update(&mut self, status: TaskStatus) -> SchedulerResult<()> {
        self.reconciler.update(&status);
        if status.state.is_terminal() {
            self.killing.remove(&status.task_id);
        }
        let Some(task) = self.state.fetch_task_by_id(&status.task_id)? else {
            debug!(task_id = %status.task_id, state = ?status.state, "status for unknown task");
            return Ok(());
        };
        if status.state.is_failure() {
            warn!(task = %task.name, state = ?status.state, message = %status.message, "task stopped");
        } else {
            debug!(task = %task.name, state = ?status.state, "task status");
        }
        self.state.store_status(&task.name, &status)?;
        Ok(())
    }

    /// The reconciliation request due now, if any.
    pub fn reconcile(&mut self) -> Option<ReconcileRequest> {
        self.reconciler.reconcile(self.clock.now_millis())
    }

    /// Stops handing out work under the plan or one of its phases.
    pub fn interrupt(&mut self, element: &str) -> SchedulerResult<()> {
        self.ensure_interruptible(element)?;
        self.overrides.interrupt(element);
        self.overrides.save(self.state.as_ref())?;
        info!(element, "interrupted");
        Ok(())
    }

    /// Returns false if `element` was not interrupted.
    pub fn resume(&mut self, element: &str) -> SchedulerResult<bool> {
        self.ensure_interruptible(element)?;
        let resumed = self.overrides.resume(element);
        if resumed {
            self.overrides.save(self.state.as_ref())?;
            info!(element, "resumed");
        }
        Ok(resumed)
    }

    fn ensure_interruptible(&self, element: &str) -> SchedulerResult<()> {
        if self.plan.is_interruptible(element) {
            Ok(())
        } else {
            Err(PlanError::UnknownElement(element.to_string()).into())
        }
    }

    /// Marks every deploy step under `element` for relaunch and returns the
    /// tasks to kill.
    pub fn restart(&mut self, element: &str) -> SchedulerResult<Vec<TaskId>> {
        let requirements = self.requirements_under(element)?;
        let mut kills = Vec::new();
        for (step, requirement) in &requirements {
            self.overrides.set(step, StepOverride::Restart);
            kills.extend(self.active_tasks(requirement)?);
        }
        self.overrides.save(self.state.as_ref())?;
        self.killing.extend(kills.iter().copied());
        info!(element, steps = requirements.len(), kills = kills.len(), "restarting");
        Ok(kills)
    }

    /// Treats every deploy step under `element` as complete.
    pub fn force_complete(&mut self, element: &str) -> SchedulerResult<()> {
        let requirements = self.requirements_under(element)?;
        for (step, _) in &requirements {
            self.overrides.set(step, StepOverride::ForceComplete);
        }
        self.overrides.save(self.state.as_ref())?;
        info!(element, steps = requirements.len(), "forced complete");
        Ok(())
    }

    fn requirements_under(
        &self,
        element: &str,
    ) -> SchedulerResult<Vec<(String, PodInstanceRequirement)>> {
        Ok(self
            .plan
            .steps_under(element)?
            .into_iter()
            .filter_map(|s| s.requirement().map(|r| (s.name.clone(), r.clone())))
            .collect())
    }

    /// Labels every task of pod instance `pod` permanently failed and
    /// returns the tasks to kill. Recovery then replaces the whole pod on
    /// fresh reservations.
    pub fn replace_pod(&mut self, pod: &str) -> SchedulerResult<Vec<TaskId>> {
        let requirement = self
            .plan
            .find_step(pod)
            .and_then(|at| self.plan.step(at))
            .and_then(Step::requirement)
            .cloned()
            .ok_or_else(|| PlanError::UnknownElement(pod.to_string()))?;

        let mut tasks = Vec::new();
        for name in requirement.full_task_names() {
            if let Some(mut task) = self.state.fetch_task(&name)? {
                task.mark_permanently_failed();
                tasks.push(task);
            }
        }
        if tasks.is_empty() {
            warn!(pod, "pod has never been launched, nothing to replace");
            return Ok(Vec::new());
        }
        self.state.store_tasks(&tasks)?;
        let kills = self.active_tasks(&requirement)?;
        self.killing.extend(kills.iter().copied());
        info!(pod, tasks = tasks.len(), kills = kills.len(), "replacing pod");
        Ok(kills)
    }

    pub fn status(&self) -> SchedulerResult<SchedulerStatus> {
        let deploy = self.snapshot()?;
        let reconciled = self.reconciler.is_reconciled();
        let recovery = if reconciled {
            let dirty = deploy.in_flight_assets(&self.plan);
            self.recovery
                .steps(&self.spec, &dirty)?
                .iter()
                .map(RecoveryStepView::from)
                .collect()
        } else {
            Vec::new()
        };
        Ok(SchedulerStatus {
            service: self.spec.name.clone(),
            target_configuration: self.target,
            reconciled,
            deploy,
            recovery,
            tasks: TaskCounts::collect(self.state.as_ref())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::builder::SchedulerBuilder;
    use crate::app::config::SchedulerConfig;
    use crate::domain::resource::{CPUS, MEM};
    use crate::domain::{PodSpec, RecoveryType, Resource, TaskInfo, TaskSpec, TaskState};
    use crate::error::SchedulerError;
    use crate::impls::{InMemoryConfigStore, InMemoryStateStore};
    use crate::ports::{ConfigStore, FixedClock, UlidGenerator};

    struct Harness {
        state: Arc<dyn StateStore>,
        configs: Arc<dyn ConfigStore>,
        clock: Arc<FixedClock>,
    }

    impl Harness {
        fn new() -> Self {
            let clock = Arc::new(FixedClock::from_millis(1_700_000_000_000));
            Self {
                state: Arc::new(InMemoryStateStore::new()),
                configs: Arc::new(InMemoryConfigStore::new(Arc::new(UlidGenerator::new(
                    clock.clone(),
                )))),
                clock,
            }
        }

        fn scheduler(&self, spec: ServiceSpec) -> DefaultScheduler {
            let config = SchedulerConfig::from_toml_str("[recovery]\nmin_launch_delay_ms = 60000")
                .unwrap();
            let mut scheduler = SchedulerBuilder::new(spec)
                .config(config)
                .state_store(self.state.clone())
                .config_store(self.configs.clone())
                .clock(self.clock.clone())
                .build()
                .unwrap();
            // answer explicit reconciliation with what the store holds
            let mut request = scheduler.reconcile();
            if matches!(request, Some(ReconcileRequest::Explicit(_))) {
                for status in self.state.fetch_statuses().unwrap() {
                    scheduler.status_update(status).unwrap();
                }
                request = scheduler.reconcile();
            }
            assert_eq!(request, Some(ReconcileRequest::Implicit));
            assert!(scheduler.is_reconciled());
            scheduler
        }
    }

    fn spec(command: &str, count: u32) -> ServiceSpec {
        ServiceSpec {
            name: "hello-world".to_string(),
            role: "hello-role".to_string(),
            principal: "hello-principal".to_string(),
            pods: vec![PodSpec {
                pod_type: "hello".to_string(),
                count,
                sticky: true,
                placement: None,
                executor: None,
                tasks: vec![
                    TaskSpec::new("server", command)
                        .with_resource(CPUS, 1.0)
                        .with_resource(MEM, 256.0),
                ],
            }],
        }
    }

    fn offer(id: &str) -> Offer {
        Offer::new(id, format!("agent-{id}"), format!("host-{id}"))
            .with_resource(Resource::scalar(CPUS, 4.0))
            .with_resource(Resource::scalar(MEM, 4096.0))
    }

    /// Offer holding exactly the reservations of `task`.
    fn reserved_offer(id: &str, task: &TaskInfo) -> Offer {
        let mut offer = Offer::new(id, task.agent_id.as_str(), task.hostname.clone());
        offer.resources = task.resources.clone();
        offer
    }

    fn launched(decisions: &OfferDecisions) -> Vec<TaskInfo> {
        decisions
            .accepted
            .iter()
            .flat_map(|a| &a.operations)
            .flat_map(|op| match op {
                Operation::LaunchGroup { tasks, .. } => tasks.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    fn report(scheduler: &mut DefaultScheduler, tasks: &[TaskInfo], state: TaskState) {
        for task in tasks {
            scheduler
                .status_update(TaskStatus::new(task.task_id, state))
                .unwrap();
        }
    }

    #[test]
    fn nothing_launches_before_reconciliation() {
        let h = Harness::new();
        let mut scheduler = SchedulerBuilder::new(spec("./hello", 1))
            .state_store(h.state.clone())
            .config_store(h.configs.clone())
            .clock(h.clock.clone())
            .build()
            .unwrap();

        let decisions = scheduler.resource_offers(vec![offer("o1")]).unwrap();
        assert_eq!(decisions.declined, vec![OfferId::new("o1")]);
        assert!(decisions.accepted.is_empty());

        assert_eq!(scheduler.reconcile(), Some(ReconcileRequest::Implicit));
        assert!(scheduler.is_reconciled());
        assert_eq!(scheduler.resource_offers(vec![offer("o2")]).unwrap().launches(), 1);
    }

    #[test]
    fn serial_phase_launches_one_instance_at_a_time() {
        let h = Harness::new();
        let mut scheduler = h.scheduler(spec("./hello", 2));

        let decisions = scheduler
            .resource_offers(vec![offer("o1"), offer("o2")])
            .unwrap();
        let first = launched(&decisions);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "hello-0-server");
        assert_eq!(decisions.declined, vec![OfferId::new("o2")]);

        // launched, no status yet: PREPARED, so nothing new is eligible
        assert!(launched(&scheduler.resource_offers(vec![offer("o3")]).unwrap()).is_empty());

        report(&mut scheduler, &first, TaskState::Running);
        let second = launched(&scheduler.resource_offers(vec![offer("o4")]).unwrap());
        assert_eq!(second[0].name, "hello-1-server");
        report(&mut scheduler, &second, TaskState::Running);

        let status = scheduler.status().unwrap();
        assert!(status.is_settled());
        assert_eq!(status.tasks.running, 2);
    }

    #[test]
    fn config_update_kills_then_relaunches_on_the_same_reservations() {
        let h = Harness::new();
        let mut scheduler = h.scheduler(spec("./hello", 1));
        let old = launched(&scheduler.resource_offers(vec![offer("o1")]).unwrap());
        report(&mut scheduler, &old, TaskState::Running);

        let mut updated = h.scheduler(spec("./hello --v2", 1));
        assert_ne!(updated.target(), scheduler.target());
        assert_eq!(updated.snapshot().unwrap().phases[1].status, Status::Pending);

        let decisions = updated
            .resource_offers(vec![reserved_offer("o2", &old[0])])
            .unwrap();
        assert_eq!(decisions.kills, vec![old[0].task_id]);
        assert!(decisions.accepted.is_empty());
        // kill already requested
        assert!(updated.resource_offers(Vec::new()).unwrap().kills.is_empty());

        report(&mut updated, &old, TaskState::Killed);
        let decisions = updated
            .resource_offers(vec![reserved_offer("o3", &old[0])])
            .unwrap();
        let new = launched(&decisions);
        assert_eq!(new[0].command.value, "./hello --v2");
        assert_ne!(new[0].task_id, old[0].task_id);
        assert_eq!(new[0].resources, old[0].resources);
        assert!(
            decisions.accepted[0]
                .operations
                .iter()
                .all(|op| matches!(op, Operation::LaunchGroup { .. }))
        );
    }

    #[test]
    fn restart_kills_and_relaunches_once() {
        let h = Harness::new();
        let mut scheduler = h.scheduler(spec("./hello", 1));
        let first = launched(&scheduler.resource_offers(vec![offer("o1")]).unwrap());
        report(&mut scheduler, &first, TaskState::Running);

        assert_eq!(scheduler.restart("hello-0").unwrap(), vec![first[0].task_id]);
        assert_eq!(scheduler.snapshot().unwrap().phases[1].status, Status::Pending);

        report(&mut scheduler, &first, TaskState::Killed);
        let second = launched(
            &scheduler
                .resource_offers(vec![reserved_offer("o2", &first[0])])
                .unwrap(),
        );
        assert_eq!(second.len(), 1);
        report(&mut scheduler, &second, TaskState::Running);
        assert!(scheduler.snapshot().unwrap().is_complete());
    }

    #[test]
    fn replaced_pod_is_relaunched_by_permanent_recovery() {
        let h = Harness::new();
        let mut scheduler = h.scheduler(spec("./hello", 1));
        let first = launched(&scheduler.resource_offers(vec![offer("o1")]).unwrap());
        report(&mut scheduler, &first, TaskState::Running);

        assert_eq!(scheduler.replace_pod("hello-0").unwrap(), vec![first[0].task_id]);
        report(&mut scheduler, &first, TaskState::Killed);

        let status = scheduler.status().unwrap();
        assert_eq!(status.recovery[0].recovery_type, RecoveryType::Permanent);
        assert!(status.recovery[0].permitted);

        let decisions = scheduler.resource_offers(vec![offer("o2")]).unwrap();
        let second = launched(&decisions);
        assert_eq!(second.len(), 1);
        assert_ne!(second[0].resources, first[0].resources);
        assert!(!second[0].is_permanently_failed());
    }

    #[test]
    fn failed_task_recovers_in_place() {
        let h = Harness::new();
        let mut scheduler = h.scheduler(spec("./hello", 1));
        let first = launched(&scheduler.resource_offers(vec![offer("o1")]).unwrap());
        report(&mut scheduler, &first, TaskState::Running);
        report(&mut scheduler, &first, TaskState::Failed);

        let status = scheduler.status().unwrap();
        assert_eq!(status.recovery[0].recovery_type, RecoveryType::Transient);

        let second = launched(
            &scheduler
                .resource_offers(vec![reserved_offer("o2", &first[0])])
                .unwrap(),
        );
        assert_eq!(second[0].resources, first[0].resources);
    }

    #[test]
    fn interrupted_plan_launches_nothing_until_resumed() {
        let h = Harness::new();
        let mut scheduler = h.scheduler(spec("./hello", 1));
        scheduler.interrupt("deploy").unwrap();
        assert!(launched(&scheduler.resource_offers(vec![offer("o1")]).unwrap()).is_empty());

        assert!(scheduler.resume("deploy").unwrap());
        assert!(!scheduler.resume("deploy").unwrap());
        assert_eq!(scheduler.resource_offers(vec![offer("o2")]).unwrap().launches(), 1);
    }

    #[test]
    fn unknown_elements_are_rejected() {
        let h = Harness::new();
        let mut scheduler = h.scheduler(spec("./hello", 1));
        for result in [
            scheduler.interrupt("hello-0").map(|_| ()),
            scheduler.restart("nope").map(|_| ()),
            scheduler.replace_pod("hello-7").map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(SchedulerError::Plan(PlanError::UnknownElement(_)))
            ));
        }
    }

    #[test]
    fn force_complete_skips_a_step() {
        let h = Harness::new();
        let mut scheduler = h.scheduler(spec("./hello", 2));
        scheduler.force_complete("hello-0").unwrap();
        let first = launched(&scheduler.resource_offers(vec![offer("o1")]).unwrap());
        assert_eq!(first[0].name, "hello-1-server");
    }

    #[test]
    fn unused_offer_releases_orphaned_reservations() {
        let h = Harness::new();
        let mut scheduler = h.scheduler(spec("./hello", 1));
        let first = launched(&scheduler.resource_offers(vec![offer("o1")]).unwrap());
        report(&mut scheduler, &first, TaskState::Running);

        let orphan = Resource::scalar(CPUS, 2.0).reserved(
            scheduler
                .evaluator
                .reservation()
                .with_id(crate::domain::ResourceId::from_ulid(ulid::Ulid::new())),
        );
        let decisions = scheduler
            .resource_offers(vec![offer("o2").with_resource(orphan.clone())])
            .unwrap();
        assert_eq!(
            decisions.accepted,
            vec![AcceptedOffer {
                offer_id: OfferId::new("o2"),
                operations: vec![Operation::Unreserve {
                    resources: vec![orphan]
                }],
            }]
        );
    }
}
