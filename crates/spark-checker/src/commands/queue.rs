//! Dispute queue fed from stdin and an optional pending-disputes file

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use spark_disputes::{DisputePoller, DisputeQueue, LogActivity};
use spark_retrieval::{Orchestrator, SparkConfig};
use tokio::io::BufReader;
use tracing::info;

use crate::jsonl::{feed_disputes, FileDisputes, JsonLinesReporter};

#[derive(Debug, Args)]
pub struct QueueArgs {
    /// JSON array of pending disputes, polled at start and then every
    /// `queue.poll_interval_secs`
    #[arg(long)]
    pub pending: Option<PathBuf>,
}

pub async fn run(config: &SparkConfig, args: QueueArgs) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(config, None)?);
    let reporter = Arc::new(JsonLinesReporter::new(std::io::stdout()));
    let queue = DisputeQueue::new(orchestrator, reporter, Arc::new(LogActivity), &config.queue);
    let (handle, worker) = queue.spawn();
    info!(
        version = spark_types::SPARK_VERSION,
        max_concurrent_checks = config.queue.max_concurrent_checks,
        "Starting Spark checker"
    );

    let poll_interval = config.queue.poll_interval_secs.map(Duration::from_secs);
    let poller = args.pending.map(|path| {
        let poller = DisputePoller::new(Arc::new(FileDisputes::new(path)), handle.clone(), poll_interval);
        tokio::spawn(poller.run())
    });

    tokio::select! {
        result = feed_disputes(BufReader::new(tokio::io::stdin()), &handle) => {
            let queued = result?;
            info!(queued, "Reached end of input");
            if poller.is_some() && poll_interval.is_some() {
                info!("Still polling pending disputes, interrupt to stop");
                tokio::signal::ctrl_c().await.context("Cannot listen for interrupt")?;
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Received interrupt, shutting down"),
    }

    if let Some(poller) = poller {
        // a single poll is left to finish, a periodic one would never end
        if poll_interval.is_some() {
            poller.abort();
        }
        let _ = poller.await;
    }
    drop(handle);

    let worker = worker.await.context("Dispute queue worker failed")?;
    let counters = worker.counters();
    info!(
        completed = counters.completed,
        failed = counters.failed,
        skipped = counters.skipped,
        "All disputes processed"
    );
    Ok(())
}
