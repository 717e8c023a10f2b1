//! ClusterDriver port - the cluster manager connection.
//!
//! The decision core never calls this directly; `app::event_loop` applies
//! the core's decisions through it.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{OfferId, Operation, TaskId};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("unknown offer {0}")]
    UnknownOffer(OfferId),

    #[error("operation rejected: {0}")]
    Rejected(String),

    #[error("driver disconnected")]
    Disconnected,
}

/// Task status reconciliation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileRequest {
    /// Ask for the latest status of these tasks.
    Explicit(Vec<TaskId>),
    /// Ask for the status of every task the cluster knows about.
    Implicit,
}

#[async_trait]
pub trait ClusterDriver: Send + Sync {
    /// Applies `operations` in order against one offer.
    async fn accept(&self, offer_id: &OfferId, operations: Vec<Operation>) -> Result<(), DriverError>;

    async fn decline(&self, offer_id: &OfferId) -> Result<(), DriverError>;

    /// Kills a running task. Its reservations come back in later offers.
    async fn kill(&self, task_id: &TaskId) -> Result<(), DriverError>;

    async fn reconcile(&self, request: ReconcileRequest) -> Result<(), DriverError>;
}
