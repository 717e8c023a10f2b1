//! Plans: Plan -> Phase -> Step, with a strategy at each level.
//!
//! The definition (`Plan`) is immutable. Statuses are never stored on it;
//! every pass derives a `PlanSnapshot` from persisted task state plus the
//! persisted `PlanOverrides`.

pub mod backoff;
pub mod builder;
pub mod dependency;
pub mod element;
pub mod overrides;
pub mod reconciliation;
pub mod step;
pub mod strategy;

use thiserror::Error;

pub use self::backoff::BackoffPolicy;
pub use self::builder::{DEPLOY_PLAN, PlanBuilder, StrategyKind, StrategySpec};
pub use self::dependency::DependencyGraph;
pub use self::element::{
    Phase, PhaseSnapshot, Plan, PlanSnapshot, Step, StepKind, StepRef, StepSnapshot,
};
pub use self::overrides::{PlanOverrides, StepOverride};
pub use self::reconciliation::{DefaultReconciler, Reconciler};
pub use self::strategy::{ChildState, DependencyStrategy, Strategy};

/// Plan construction errors. Fatal: the plan cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("dependency cycle: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("'{element}' depends on unknown element '{dependency}'")]
    UnknownDependency { element: String, dependency: String },

    #[error("duplicate element name '{0}'")]
    DuplicateElement(String),

    #[error("no plan element named '{0}'")]
    UnknownElement(String),

    #[error("invalid requirement for step '{step}': {reason}")]
    InvalidRequirement { step: String, reason: String },
}
