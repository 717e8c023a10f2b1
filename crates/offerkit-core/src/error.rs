//! Top-level scheduler error.

use thiserror::Error;

use crate::domain::{SpecValidationError, TaskLabelError};
use crate::offer::discovery::DiscoveryError;
use crate::offer::requirement::RequirementError;
use crate::plan::PlanError;
use crate::ports::{DriverError, StateError};

/// How the operator should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Plan or spec cannot be built; abort startup or the redeploy.
    Construction,
    /// Stored state is corrupt; halt processing of the affected entity.
    Corruption,
    /// Store or cluster connection failure; may succeed on a later pass.
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Spec(#[from] SpecValidationError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    TaskLabel(#[from] TaskLabelError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("no target configuration stored")]
    NoTargetConfig,
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Spec(_)
            | SchedulerError::Plan(_)
            | SchedulerError::Requirement(_)
            | SchedulerError::NoTargetConfig => ErrorKind::Construction,
            SchedulerError::Discovery(_) | SchedulerError::TaskLabel(_) => ErrorKind::Corruption,
            SchedulerError::State(StateError::Serialization { .. }) => ErrorKind::Corruption,
            SchedulerError::State(_) | SchedulerError::Driver(_) => ErrorKind::Infrastructure,
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
