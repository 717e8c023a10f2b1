//! Task status reconciliation with the cluster manager.
//!
//! Runs before anything else after a (re)start: statuses in the store may be
//! stale, and deploy decisions must not be made on them.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::domain::{Status, TaskId, TaskStatus};
use crate::ports::ReconcileRequest;

use super::backoff::BackoffPolicy;

/// Reconciliation capability driven by the scheduler.
///
/// # Implementations
/// - **DefaultReconciler**: explicit rounds with backoff, then one implicit
pub trait Reconciler: Send + Sync {
    /// Begins reconciling the statuses known at startup.
    fn start(&mut self, known: Vec<TaskStatus>);

    fn is_started(&self) -> bool;

    fn is_reconciled(&self) -> bool;

    /// Records a status received from the cluster manager.
    fn update(&mut self, status: &TaskStatus);

    /// The request to send now, if one is due.
    fn reconcile(&mut self, now_ms: i64) -> Option<ReconcileRequest>;

    /// Status of the reconciliation step.
    fn status(&self) -> Status {
        if !self.is_started() {
            Status::Pending
        } else if self.is_reconciled() {
            Status::Complete
        } else {
            Status::InProgress
        }
    }
}

/// # Design
/// - explicit requests for every still-unanswered task id, spaced by the
///   backoff policy
/// - once every task answered, one implicit request; then reconciled
/// - a status for a task that is not pending reconciliation is ignored
#[derive(Debug, Clone)]
pub struct DefaultReconciler {
    backoff: BackoffPolicy,
    unreconciled: BTreeSet<TaskId>,
    started: bool,
    implicit_sent: bool,
    attempts: u32,
    next_attempt_ms: i64,
}

impl DefaultReconciler {
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            backoff,
            unreconciled: BTreeSet::new(),
            started: false,
            implicit_sent: false,
            attempts: 0,
            next_attempt_ms: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.unreconciled.len()
    }
}

impl Reconciler for DefaultReconciler {
    fn start(&mut self, known: Vec<TaskStatus>) {
        self.unreconciled = known.into_iter().map(|s| s.task_id).collect();
        self.started = true;
        self.implicit_sent = false;
        self.attempts = 0;
        self.next_attempt_ms = 0;
        info!(tasks = self.unreconciled.len(), "reconciliation started");
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn is_reconciled(&self) -> bool {
        self.started && self.implicit_sent && self.unreconciled.is_empty()
    }

    fn update(&mut self, status: &TaskStatus) {
        if self.unreconciled.remove(&status.task_id) {
            debug!(task_id = %status.task_id, remaining = self.unreconciled.len(), "task reconciled");
        }
    }

    fn reconcile(&mut self, now_ms: i64) -> Option<ReconcileRequest> {
        if !self.started || self.implicit_sent {
            return None;
        }
        if self.unreconciled.is_empty() {
            self.implicit_sent = true;
            info!("explicit reconciliation done, sending implicit request");
            return Some(ReconcileRequest::Implicit);
        }
        if now_ms < self.next_attempt_ms {
            return None;
        }
        self.attempts += 1;
        let delay = self.backoff.next_delay(self.attempts);
        self.next_attempt_ms = now_ms.saturating_add(delay.as_millis().min(i64::MAX as u128) as i64);
        debug!(
            attempt = self.attempts,
            tasks = self.unreconciled.len(),
            next_in_ms = delay.as_millis() as u64,
            "explicit reconciliation"
        );
        Some(ReconcileRequest::Explicit(
            self.unreconciled.iter().copied().collect(),
        ))
    }
}
