//! Builds the deploy plan of a service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{PodInstance, PodInstanceRequirement, ServiceSpec};

use super::PlanError;
use super::element::{Phase, Plan, RECONCILIATION, Step};
use super::strategy::{DependencyStrategy, Strategy};

pub const DEPLOY_PLAN: &str = "deploy";

/// Strategy selector as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Serial,
    Parallel,
    Dependency,
}

/// Strategy plus, for `Dependency`, the child -> prerequisites map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySpec {
    #[serde(default)]
    pub kind: StrategyKind,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl StrategySpec {
    pub fn parallel() -> Self {
        Self {
            kind: StrategyKind::Parallel,
            dependencies: BTreeMap::new(),
        }
    }

    pub fn dependency(dependencies: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            kind: StrategyKind::Dependency,
            dependencies,
        }
    }

    fn build<S: AsRef<str>>(&self, children: &[S]) -> Result<Strategy, PlanError> {
        Ok(match self.kind {
            StrategyKind::Serial => Strategy::Serial,
            StrategyKind::Parallel => Strategy::Parallel,
            StrategyKind::Dependency => {
                Strategy::Dependency(DependencyStrategy::new(children, &self.dependencies)?)
            }
        })
    }
}

/// Deploy plan layout: a reconciliation phase, then one phase per pod type
/// (in declaration order) holding one step per pod instance.
pub struct PlanBuilder<'a> {
    spec: &'a ServiceSpec,
    plan_strategy: StrategySpec,
    phase_strategies: BTreeMap<String, StrategySpec>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(spec: &'a ServiceSpec) -> Self {
        Self {
            spec,
            plan_strategy: StrategySpec::default(),
            phase_strategies: BTreeMap::new(),
        }
    }

    /// Strategy across phases. Phase names are the pod types.
    pub fn plan_strategy(mut self, strategy: StrategySpec) -> Self {
        self.plan_strategy = strategy;
        self
    }

    /// Strategy across the instances of `pod_type`. Step names are
    /// `"{pod_type}-{index}"`.
    pub fn phase_strategy(mut self, pod_type: impl Into<String>, strategy: StrategySpec) -> Self {
        self.phase_strategies.insert(pod_type.into(), strategy);
        self
    }

    pub fn build(self) -> Result<Plan, PlanError> {
        let mut phases = vec![Phase::new(
            RECONCILIATION,
            Strategy::Serial,
            vec![Step::reconciliation()],
        )];
        for pod in &self.spec.pods {
            let steps: Vec<Step> = (0..pod.count)
                .map(|index| {
                    Step::deploy(PodInstanceRequirement::all_tasks(PodInstance::new(
                        pod.clone(),
                        index,
                    )))
                })
                .collect();
            let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
            let strategy = self
                .phase_strategies
                .get(&pod.pod_type)
                .map(|s| s.build(&names))
                .transpose()?
                .unwrap_or(Strategy::Serial);
            phases.push(Phase::new(pod.pod_type.clone(), strategy, steps));
        }
        if let Some(unknown) = self
            .phase_strategies
            .keys()
            .find(|k| self.spec.pod(k).is_none())
        {
            return Err(PlanError::UnknownElement(unknown.clone()));
        }

        let phase_names: Vec<&str> = phases.iter().map(|p| p.name.as_str()).collect();
        let strategy = self.plan_strategy.build(&phase_names)?;
        Plan::new(DEPLOY_PLAN, strategy, phases)
    }
}
