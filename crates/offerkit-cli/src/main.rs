use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use offerkit_core::app::{
    SchedulerBuilder, SchedulerConfig, SchedulerEvent, SchedulerLoop, load_service_spec,
};
use offerkit_core::impls::{AgentSpec, SimulatedCluster};
use offerkit_core::ports::{Clock, ClusterDriver, FixedClock};

#[derive(Debug, Parser)]
#[command(name = "offerkit", about = "Resource-offer scheduler driven against a simulated cluster")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Deploys a service onto simulated agents and prints the final status.
    Run {
        /// Service spec (TOML).
        #[arg(long)]
        service: PathBuf,
        /// Scheduler configuration (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        agents: usize,
        /// Offer rounds before giving up.
        #[arg(long, default_value_t = 50)]
        max_passes: u32,
        /// Simulated time between two offer rounds.
        #[arg(long, default_value_t = 10_000)]
        pass_interval_ms: i64,
        /// Fail this task once the deploy completes, to watch recovery.
        #[arg(long)]
        fail_task: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Run {
            service,
            config,
            agents,
            max_passes,
            pass_interval_ms,
            fail_task,
        } => run(service, config, agents, max_passes, pass_interval_ms, fail_task).await,
    }
}

async fn run(
    service: PathBuf,
    config: Option<PathBuf>,
    agents: usize,
    max_passes: u32,
    pass_interval_ms: i64,
    mut fail_task: Option<String>,
) -> Result<()> {
    let spec = load_service_spec(&service)
        .with_context(|| format!("loading service spec {}", service.display()))?;
    let config = match config {
        Some(path) => SchedulerConfig::load(&path)
            .with_context(|| format!("loading scheduler config {}", path.display()))?,
        None => SchedulerConfig::default(),
    };

    let clock = Arc::new(FixedClock::from_millis(0));
    let scheduler = SchedulerBuilder::new(spec)
        .config(config)
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .build()
        .context("building scheduler")?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let agents = (0..agents).map(|i| AgentSpec::new(format!("host-{i}"))).collect();
    let cluster = Arc::new(SimulatedCluster::new(agents, events_tx.clone()));
    let scheduler_loop = SchedulerLoop::spawn(
        scheduler,
        Arc::clone(&cluster) as Arc<dyn ClusterDriver>,
        events_rx,
    );

    let mut settled = false;
    for pass in 1..=max_passes {
        clock.advance_millis(pass_interval_ms);
        events_tx
            .send(SchedulerEvent::Tick)
            .context("scheduler loop stopped")?;
        cluster.offer_round().await;
        flush(&events_tx).await?;

        let Some(status) = scheduler_loop.status() else {
            continue;
        };
        if !status.is_settled() {
            continue;
        }
        let Some(name) = fail_task.take() else {
            info!(pass, "service settled");
            settled = true;
            break;
        };
        if cluster.fail_task(&name).await {
            info!(pass, task = %name, "failed task to exercise recovery");
            flush(&events_tx).await?;
        } else {
            warn!(task = %name, "no running task with that name");
        }
    }

    let scheduler = scheduler_loop
        .shutdown_and_join()
        .await
        .context("scheduler loop panicked")?;
    let status = scheduler.status().context("collecting status")?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    if !settled {
        anyhow::bail!("service did not settle within {max_passes} passes");
    }
    Ok(())
}

/// Waits until the loop has handled everything queued so far.
async fn flush(events: &mpsc::UnboundedSender<SchedulerEvent>) -> Result<()> {
    let (done_tx, done_rx) = oneshot::channel();
    events
        .send(SchedulerEvent::Flush(done_tx))
        .context("scheduler loop stopped")?;
    done_rx.await.context("scheduler loop stopped")?;
    Ok(())
}
