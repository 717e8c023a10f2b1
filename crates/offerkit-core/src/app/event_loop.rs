//! SchedulerLoop - serializes cluster events into the decision core.
//!
//! One tokio task owns the `DefaultScheduler`. Offers, status updates,
//! timer ticks and operator commands arrive on one channel and are handled
//! strictly in order; decisions are applied through the `ClusterDriver`
//! before the next event is read. After every event the loop publishes a
//! fresh `SchedulerStatus` on a watch channel.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::domain::{Offer, OfferId, Operation, TaskId, TaskState, TaskStatus};
use crate::error::{ErrorKind, SchedulerResult};
use crate::ports::ClusterDriver;

use super::scheduler::DefaultScheduler;
use super::status::SchedulerStatus;

/// Operator command against the deploy plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanCommand {
    Interrupt(String),
    Resume(String),
    Restart(String),
    ForceComplete(String),
    ReplacePod(String),
}

#[derive(Debug)]
pub enum SchedulerEvent {
    Offers(Vec<Offer>),
    TaskStatus(TaskStatus),
    /// Drives reconciliation timing.
    Tick,
    Command(PlanCommand),
    /// Handles every event already queued, then answers.
    Flush(oneshot::Sender<()>),
}

/// Handle of the running loop.
/// - `request_shutdown()` stops it after the event in hand
/// - `shutdown_and_join()` hands the scheduler back
pub struct SchedulerLoop {
    shutdown_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<Option<SchedulerStatus>>,
    join: JoinHandle<DefaultScheduler>,
}

impl SchedulerLoop {
    pub fn spawn(
        scheduler: DefaultScheduler,
        driver: Arc<dyn ClusterDriver>,
        events: mpsc::UnboundedReceiver<SchedulerEvent>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(None);
        let join = tokio::spawn(run(scheduler, driver, events, shutdown_rx, status_tx));
        Self {
            shutdown_tx,
            status_rx,
            join,
        }
    }

    /// Latest published status.
    pub fn status(&self) -> Option<SchedulerStatus> {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SchedulerStatus>> {
        self.status_rx.clone()
    }

    pub fn request_shutdown(&self) {
        // the loop may already have exited
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) -> Result<DefaultScheduler, JoinError> {
        self.request_shutdown();
        self.join.await
    }
}

async fn run(
    mut scheduler: DefaultScheduler,
    driver: Arc<dyn ClusterDriver>,
    mut events: mpsc::UnboundedReceiver<SchedulerEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<Option<SchedulerStatus>>,
) -> DefaultScheduler {
    publish(&scheduler, &status_tx);
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let event = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            event = events.recv() => event,
        };
        let Some(event) = event else {
            debug!("event channel closed");
            break;
        };

        match event {
            SchedulerEvent::Flush(done) => {
                // handling an event may queue more (statuses of a launch)
                while let Ok(queued) = events.try_recv() {
                    handle(&mut scheduler, driver.as_ref(), queued).await;
                }
                let _ = done.send(());
            }
            event => handle(&mut scheduler, driver.as_ref(), event).await,
        }
        publish(&scheduler, &status_tx);
    }
    info!("scheduler loop stopped");
    scheduler
}

async fn handle(scheduler: &mut DefaultScheduler, driver: &dyn ClusterDriver, event: SchedulerEvent) {
    let result = match event {
        SchedulerEvent::Offers(offers) => apply_offers(scheduler, driver, offers).await,
        SchedulerEvent::TaskStatus(status) => scheduler.status_update(status),
        SchedulerEvent::Tick => reconcile(scheduler, driver).await,
        SchedulerEvent::Command(command) => match apply_command(scheduler, command) {
            Ok(kills) => {
                kill_all(driver, &kills).await;
                Ok(())
            }
            Err(e) => Err(e),
        },
        SchedulerEvent::Flush(done) => {
            let _ = done.send(());
            Ok(())
        }
    };
    if let Err(e) = result {
        match e.kind() {
            ErrorKind::Infrastructure => warn!(error = %e, "event failed, retrying on a later pass"),
            ErrorKind::Construction | ErrorKind::Corruption => error!(error = %e, "event failed"),
        }
    }
}

async fn apply_offers(
    scheduler: &mut DefaultScheduler,
    driver: &dyn ClusterDriver,
    offers: Vec<Offer>,
) -> SchedulerResult<()> {
    let count = offers.len();
    let offer_ids: Vec<OfferId> = offers.iter().map(|o| o.id.clone()).collect();
    let decisions = match scheduler.resource_offers(offers) {
        Ok(decisions) => decisions,
        Err(e) => {
            // hand the offers back so other frameworks can use them
            decline_all(driver, &offer_ids).await;
            return Err(e);
        }
    };
    debug!(
        offers = count,
        accepted = decisions.accepted.len(),
        declined = decisions.declined.len(),
        kills = decisions.kills.len(),
        "offer pass done"
    );

    kill_all(driver, &decisions.kills).await;
    for accepted in decisions.accepted {
        let launched: Vec<TaskId> = accepted
            .operations
            .iter()
            .filter_map(|op| match op {
                Operation::LaunchGroup { tasks, .. } => Some(tasks.iter().map(|t| t.task_id)),
                _ => None,
            })
            .flatten()
            .collect();
        if let Err(e) = driver.accept(&accepted.offer_id, accepted.operations).await {
            warn!(offer = %accepted.offer_id, error = %e, "accept failed");
            // the launches never happened
            for task_id in launched {
                let status = TaskStatus {
                    message: e.to_string(),
                    ..TaskStatus::new(task_id, TaskState::Error)
                };
                if let Err(e) = scheduler.status_update(status) {
                    warn!(task_id = %task_id, error = %e, "cannot record failed launch");
                }
            }
        }
    }
    decline_all(driver, &decisions.declined).await;
    Ok(())
}

async fn decline_all(driver: &dyn ClusterDriver, offer_ids: &[OfferId]) {
    for offer_id in offer_ids {
        if let Err(e) = driver.decline(offer_id).await {
            debug!(offer = %offer_id, error = %e, "decline failed");
        }
    }
}

async fn reconcile(scheduler: &mut DefaultScheduler, driver: &dyn ClusterDriver) -> SchedulerResult<()> {
    if let Some(request) = scheduler.reconcile() {
        driver.reconcile(request).await?;
    }
    Ok(())
}

/// Applies `command` and returns the tasks it wants killed.
pub fn apply_command(
    scheduler: &mut DefaultScheduler,
    command: PlanCommand,
) -> SchedulerResult<Vec<TaskId>> {
    match command {
        PlanCommand::Interrupt(element) => scheduler.interrupt(&element).map(|_| Vec::new()),
        PlanCommand::Resume(element) => scheduler.resume(&element).map(|_| Vec::new()),
        PlanCommand::Restart(element) => scheduler.restart(&element),
        PlanCommand::ForceComplete(element) => {
            scheduler.force_complete(&element).map(|_| Vec::new())
        }
        PlanCommand::ReplacePod(pod) => scheduler.replace_pod(&pod),
    }
}

async fn kill_all(driver: &dyn ClusterDriver, task_ids: &[TaskId]) {
    for task_id in task_ids {
        if let Err(e) = driver.kill(task_id).await {
            warn!(task_id = %task_id, error = %e, "kill failed");
        }
    }
}

fn publish(scheduler: &DefaultScheduler, status_tx: &watch::Sender<Option<SchedulerStatus>>) {
    match scheduler.status() {
        Ok(status) => {
            status_tx.send_replace(Some(status));
        }
        Err(e) => warn!(error = %e, "cannot compute scheduler status"),
    }
}
