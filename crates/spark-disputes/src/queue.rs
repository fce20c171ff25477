//! Dispute queue actor
//!
//! A single worker task owns the pending queue and the set of dispute ids in
//! flight. Producers only hold a [`DisputeQueueHandle`] and send commands over
//! a channel. Duplicates are allowed to sit in the queue; they are dropped when
//! the worker drains it and finds the id already in flight. Before a finished
//! check releases its id, commands already waiting in the channel are taken in,
//! so a duplicate sent while the check ran is dropped too.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use spark_error::{CheckError, SparkError};
use spark_retrieval::QueueConfig;
use spark_types::{RetrievalTask, Stats};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::activity::ActivityState;
use crate::collaborators::{CheckRunner, DisputeReporter, HostActivity};

//-----------------------------------------------------------------------------
// Handle
//-----------------------------------------------------------------------------

/// The worker has shut down and no longer accepts commands
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("dispute queue is closed")]
pub struct QueueClosed;

#[derive(Debug)]
enum Command {
    Enqueue(RetrievalTask),
    SourceFailed(String),
}

/// Cloneable sender side of the queue.
///
/// The worker stops once every handle is dropped and all accepted disputes
/// have been processed.
#[derive(Debug, Clone)]
pub struct DisputeQueueHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl DisputeQueueHandle {
    pub fn enqueue(&self, task: RetrievalTask) -> Result<(), QueueClosed> {
        self.tx.send(Command::Enqueue(task)).map_err(|_| QueueClosed)
    }

    /// Tell the worker a dispute source failed, so the host sees the error
    pub fn report_source_error(&self, message: impl Into<String>) -> Result<(), QueueClosed> {
        self.tx
            .send(Command::SourceFailed(message.into()))
            .map_err(|_| QueueClosed)
    }
}

//-----------------------------------------------------------------------------
// Worker
//-----------------------------------------------------------------------------

/// What the worker did over its lifetime
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueCounters {
    /// Disputes whose result was submitted
    pub completed: usize,
    /// Disputes aborted by a peer-resolution or reporting error
    pub failed: usize,
    /// Duplicates dropped because the same id was in flight
    pub skipped: usize,
}

type CheckOutcome = Result<Result<Stats, CheckError>, JoinError>;

const INTAKE_BATCH: usize = 256;

enum Event {
    Received(Option<Command>),
    Finished(Result<(String, CheckOutcome), JoinError>),
}

pub struct DisputeQueue {
    runner: Arc<dyn CheckRunner>,
    reporter: Arc<dyn DisputeReporter>,
    activity: ActivityState,
    max_concurrent_checks: usize,
    pending: VecDeque<RetrievalTask>,
    in_flight: HashSet<String>,
    counters: QueueCounters,
}

impl DisputeQueue {
    pub fn new(
        runner: Arc<dyn CheckRunner>,
        reporter: Arc<dyn DisputeReporter>,
        host: Arc<dyn HostActivity>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            runner,
            reporter,
            activity: ActivityState::new(host),
            max_concurrent_checks: config.max_concurrent_checks.max(1),
            pending: VecDeque::new(),
            in_flight: HashSet::new(),
            counters: QueueCounters::default(),
        }
    }

    /// Start the worker on the current runtime
    pub fn spawn(self) -> (DisputeQueueHandle, JoinHandle<DisputeQueue>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(self.run(rx));
        (DisputeQueueHandle { tx }, worker)
    }

    pub fn in_flight(&self) -> &HashSet<String> {
        &self.in_flight
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn counters(&self) -> QueueCounters {
        self.counters
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) -> Self {
        let mut running: JoinSet<(String, CheckOutcome)> = JoinSet::new();
        let mut open = true;

        loop {
            self.drain(&mut running);
            if !open && running.is_empty() && self.pending.is_empty() {
                break;
            }

            // completions before intake
            let event = tokio::select! {
                biased;

                Some(joined) = running.join_next(), if !running.is_empty() => Event::Finished(joined),
                command = rx.recv(), if open => Event::Received(command),
            };

            match event {
                Event::Received(command) => self.accept(command, &mut open),
                Event::Finished(joined) => {
                    // duplicates sent while the check ran must still be dropped
                    if open {
                        self.take_buffered(&mut rx, &mut open);
                    }
                    self.drop_in_flight_duplicates();
                    match joined {
                        Ok((dispute_id, outcome)) => self.complete(dispute_id, outcome),
                        Err(err) => error!(error = %err, "Dispute worker task was lost"),
                    }
                }
            }
        }

        info!(
            completed = self.counters.completed,
            failed = self.counters.failed,
            skipped = self.counters.skipped,
            "Dispute queue stopped"
        );
        self
    }

    fn accept(&mut self, command: Option<Command>, open: &mut bool) {
        match command {
            Some(Command::Enqueue(task)) => {
                debug!(dispute_id = %task.id, queued = self.pending.len(), "Dispute queued");
                self.pending.push_back(task);
            }
            Some(Command::SourceFailed(message)) => {
                error!(error = %message, "Error fetching pending disputes");
                self.activity.on_error();
            }
            None => {
                debug!("All queue handles dropped, finishing remaining disputes");
                *open = false;
            }
        }
    }

    /// Move commands already sitting in the channel into the queue, at most
    /// `INTAKE_BATCH` of them
    fn take_buffered(&mut self, rx: &mut mpsc::UnboundedReceiver<Command>, open: &mut bool) {
        for _ in 0..INTAKE_BATCH {
            match rx.try_recv() {
                Ok(command) => self.accept(Some(command), open),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.accept(None, open);
                    return;
                }
            }
        }
    }

    /// Start queued disputes, head first, while capacity allows
    fn drain(&mut self, running: &mut JoinSet<(String, CheckOutcome)>) {
        loop {
            self.drop_in_flight_duplicates();
            if running.len() >= self.max_concurrent_checks {
                return;
            }
            let Some(task) = self.pending.pop_front() else {
                return;
            };

            self.in_flight.insert(task.id.clone());
            info!(
                dispute_id = %task.id,
                cid = %task.cid,
                miner_id = %task.miner_id,
                raiser = ?task.raiser,
                "Processing new dispute"
            );

            let runner = Arc::clone(&self.runner);
            let reporter = Arc::clone(&self.reporter);
            let dispute_id = task.id.clone();
            running.spawn(async move {
                // a panicking check surfaces as a JoinError here, keeping the id
                let outcome = tokio::spawn(process(runner, reporter, task)).await;
                (dispute_id, outcome)
            });
        }
    }

    fn drop_in_flight_duplicates(&mut self) {
        let in_flight = &self.in_flight;
        let before = self.pending.len();
        self.pending.retain(|task| {
            let duplicate = in_flight.contains(&task.id);
            if duplicate {
                info!(dispute_id = %task.id, "Already processing dispute, skipping");
            }
            !duplicate
        });
        self.counters.skipped += before - self.pending.len();
    }

    fn complete(&mut self, dispute_id: String, outcome: CheckOutcome) {
        self.in_flight.remove(&dispute_id);

        match outcome {
            Ok(Ok(stats)) => {
                self.counters.completed += 1;
                debug!(dispute_id = %dispute_id, status_code = ?stats.status_code, "Dispute completed");
                self.activity.host().job_completed();
                self.activity.on_healthy();
            }
            Ok(Err(err)) => {
                self.counters.failed += 1;
                self.handle_run_error(&dispute_id, &err);
            }
            Err(err) => {
                self.counters.failed += 1;
                error!(dispute_id = %dispute_id, error = %err, "Dispute check panicked");
                self.activity.on_error();
            }
        }
    }

    fn handle_run_error(&mut self, dispute_id: &str, err: &CheckError) {
        if err.is_outdated_client() {
            self.activity.on_outdated_client();
        } else {
            self.activity.on_error();
        }
        error!(
            dispute_id,
            code = err.error_code(),
            error = %err,
            "Failed to process dispute"
        );
    }
}

/// Check one dispute and submit its result
async fn process(
    runner: Arc<dyn CheckRunner>,
    reporter: Arc<dyn DisputeReporter>,
    task: RetrievalTask,
) -> Result<Stats, CheckError> {
    let stats = runner.execute_check(&task).await?;
    info!(dispute_id = %task.id, ?stats, "Retrieval check stats");

    if let Err(err) = reporter.submit_result(&task, &stats).await {
        warn!(dispute_id = %task.id, error = %err, "Dispute result was not submitted");
        return Err(err.into());
    }
    info!(dispute_id = %task.id, "Dispute result submitted successfully");
    Ok(stats)
}
