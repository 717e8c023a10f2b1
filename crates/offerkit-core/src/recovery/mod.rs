//! Recovery: relaunching failed tasks outside the deploy plan.
//!
//! - **monitor**: transient or permanent failure?
//! - **constrainer**: rate limit for permanent replacements
//! - **manager**: builds the recovery steps of a pass

pub mod constrainer;
pub mod manager;
pub mod monitor;

pub use crate::domain::RecoveryType;
pub use constrainer::{LaunchConstrainer, TimedLaunchConstrainer, UnconstrainedLaunchConstrainer};
pub use manager::{RecoveryPlanManager, RecoveryStep, RecoveryStepView};
pub use monitor::{DefaultFailureMonitor, FailureMonitor, NeverFailureMonitor, TimedFailureMonitor};
