//! Plan definitions and the per-pass status snapshot.
//!
//! # Design
//! - `Plan`, `Phase` and `Step` are built once and never mutated
//! - `Plan::snapshot` derives every status bottom-up from step statuses
//!   supplied by the caller, with operator overrides applied on top
//! - `PlanSnapshot::candidates` runs the strategies over that snapshot
//!
//! Parent statuses are pure reductions of their children; nothing here
//! caches a status between passes.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::{PodInstanceRequirement, Status};

use super::PlanError;
use super::overrides::PlanOverrides;
use super::strategy::{ChildState, Strategy};

/// Name of the reconciliation phase.
pub const RECONCILIATION: &str = "reconciliation";
/// Name of the single step inside the reconciliation phase.
pub const RECONCILE_STEP: &str = "reconcile";

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Reconciliation,
    Deploy(PodInstanceRequirement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub kind: StepKind,
}

impl Step {
    pub fn reconciliation() -> Self {
        Self {
            name: RECONCILE_STEP.to_string(),
            kind: StepKind::Reconciliation,
        }
    }

    /// Named after the pod instance it launches.
    pub fn deploy(requirement: PodInstanceRequirement) -> Self {
        Self {
            name: requirement.pod_instance.name(),
            kind: StepKind::Deploy(requirement),
        }
    }

    pub fn requirement(&self) -> Option<&PodInstanceRequirement> {
        match &self.kind {
            StepKind::Deploy(req) => Some(req),
            StepKind::Reconciliation => None,
        }
    }

    /// Pod instance this step works on.
    pub fn asset(&self) -> Option<String> {
        self.requirement().map(|r| r.pod_instance.name())
    }
}

#[derive(Debug, Clone)]
pub struct Phase {
    pub name: String,
    pub strategy: Strategy,
    pub steps: Vec<Step>,
}

impl Phase {
    pub fn new(name: impl Into<String>, strategy: Strategy, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            strategy,
            steps,
        }
    }

    pub fn is_reconciliation(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.kind, StepKind::Reconciliation))
    }
}

/// Position of a step inside a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StepRef {
    pub phase: usize,
    pub step: usize,
}

#[derive(Debug, Clone)]
pub struct Plan {
    name: String,
    strategy: Strategy,
    phases: Vec<Phase>,
}

impl Plan {
    /// Fails if any two elements (plan, phases, steps) share a name.
    pub fn new(
        name: impl Into<String>,
        strategy: Strategy,
        phases: Vec<Phase>,
    ) -> Result<Self, PlanError> {
        let name = name.into();
        let mut seen = BTreeSet::from([name.clone()]);
        let names = phases
            .iter()
            .map(|p| &p.name)
            .chain(phases.iter().flat_map(|p| p.steps.iter().map(|s| &s.name)));
        for element in names {
            if !seen.insert(element.clone()) {
                return Err(PlanError::DuplicateElement(element.clone()));
            }
        }
        Ok(Self {
            name,
            strategy,
            phases,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn step(&self, at: StepRef) -> Option<&Step> {
        self.phases.get(at.phase)?.steps.get(at.step)
    }

    pub fn steps(&self) -> impl Iterator<Item = (StepRef, &Step)> {
        self.phases.iter().enumerate().flat_map(|(p, phase)| {
            phase
                .steps
                .iter()
                .enumerate()
                .map(move |(s, step)| (StepRef { phase: p, step: s }, step))
        })
    }

    pub fn find_step(&self, name: &str) -> Option<StepRef> {
        self.steps().find(|(_, s)| s.name == name).map(|(at, _)| at)
    }

    /// Steps under `element`: the whole plan, one phase or one step.
    pub fn steps_under(&self, element: &str) -> Result<Vec<&Step>, PlanError> {
        if element == self.name {
            return Ok(self.steps().map(|(_, s)| s).collect());
        }
        if let Some(phase) = self.phases.iter().find(|p| p.name == element) {
            return Ok(phase.steps.iter().collect());
        }
        self.find_step(element)
            .and_then(|at| self.step(at))
            .map(|s| vec![s])
            .ok_or_else(|| PlanError::UnknownElement(element.to_string()))
    }

    /// True if `element` is the plan or one of its phases.
    pub fn is_interruptible(&self, element: &str) -> bool {
        element == self.name || self.phases.iter().any(|p| p.name == element)
    }

    /// Derives the status tree. `step_status` is asked once per step.
    pub fn snapshot<F, E>(&self, overrides: &PlanOverrides, mut step_status: F) -> Result<PlanSnapshot, E>
    where
        F: FnMut(&Step) -> Result<Status, E>,
    {
        let mut phases = Vec::with_capacity(self.phases.len());
        for phase in &self.phases {
            let mut steps = Vec::with_capacity(phase.steps.len());
            for step in &phase.steps {
                let derived = step_status(step)?;
                steps.push(StepSnapshot {
                    name: step.name.clone(),
                    status: overrides.apply(&step.name, derived),
                    asset: step.asset(),
                });
            }
            phases.push(PhaseSnapshot {
                name: phase.name.clone(),
                strategy: phase.strategy.name(),
                status: Status::reduce(steps.iter().map(|s| s.status)),
                interrupted: overrides.is_interrupted(&phase.name),
                steps,
            });
        }
        Ok(PlanSnapshot {
            name: self.name.clone(),
            strategy: self.strategy.name(),
            status: Status::reduce(phases.iter().map(|p| p.status)),
            interrupted: overrides.is_interrupted(&self.name),
            phases,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSnapshot {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseSnapshot {
    pub name: String,
    pub strategy: &'static str,
    pub status: Status,
    pub interrupted: bool,
    pub steps: Vec<StepSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSnapshot {
    pub name: String,
    pub strategy: &'static str,
    pub status: Status,
    pub interrupted: bool,
    pub phases: Vec<PhaseSnapshot>,
}

impl PlanSnapshot {
    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }

    pub fn step(&self, at: StepRef) -> Option<&StepSnapshot> {
        self.phases.get(at.phase)?.steps.get(at.step)
    }

    /// Steps the strategies allow to be worked on this pass.
    ///
    /// `dirty` holds pod instances another plan is working on.
    ///
    /// # Design
    /// - a complete or interrupted plan has no candidates
    /// - while a reconciliation phase is incomplete it is the only candidate
    /// - interrupted phases contribute nothing
    pub fn candidates(&self, plan: &Plan, dirty: &BTreeSet<String>) -> Vec<StepRef> {
        if self.is_complete() || self.interrupted {
            return Vec::new();
        }
        let reconciling: Vec<usize> = plan
            .phases
            .iter()
            .enumerate()
            .filter(|(i, p)| p.is_reconciliation() && !self.phases[*i].status.is_complete())
            .map(|(i, _)| i)
            .collect();
        let phases = if reconciling.is_empty() {
            let children: Vec<_> = self
                .phases
                .iter()
                .map(|p| ChildState::new(&p.name, p.status))
                .collect();
            plan.strategy.candidates(&children)
        } else {
            reconciling
        };

        let mut candidates = Vec::new();
        for p in phases {
            let (definition, snapshot) = (&plan.phases[p], &self.phases[p]);
            if snapshot.interrupted {
                continue;
            }
            let children: Vec<_> = snapshot
                .steps
                .iter()
                .map(|s| {
                    let child = ChildState::new(&s.name, s.status);
                    match &s.asset {
                        Some(asset) if dirty.contains(asset) => child.dirty(),
                        _ => child,
                    }
                })
                .collect();
            candidates.extend(
                definition
                    .strategy
                    .candidates(&children)
                    .into_iter()
                    .map(|step| StepRef { phase: p, step }),
            );
        }
        candidates
    }

    /// Candidates that are still PENDING and may receive offers.
    pub fn eligible(&self, plan: &Plan, dirty: &BTreeSet<String>) -> Vec<StepRef> {
        self.candidates(plan, dirty)
            .into_iter()
            .filter(|at| self.step(*at).is_some_and(|s| s.status == Status::Pending))
            .collect()
    }

    /// Pod instances of candidate steps that have not settled yet.
    pub fn in_flight_assets(&self, plan: &Plan) -> BTreeSet<String> {
        self.candidates(plan, &BTreeSet::new())
            .into_iter()
            .filter_map(|at| self.step(at))
            .filter(|s| matches!(s.status, Status::Pending | Status::Prepared | Status::InProgress))
            .filter_map(|s| s.asset.clone())
            .collect()
    }
}
