//! External collaborators of the dispute queue
//!
//! The queue only talks to the outside world through these traits, so the
//! on-chain reporter, the dispute source and the host runtime can be swapped
//! for in-memory versions.

use async_trait::async_trait;
use spark_error::{PeerResolutionError, ReportError};
use spark_retrieval::Orchestrator;
use spark_types::{RetrievalTask, Stats};

/// Runs the verification for a single dispute
#[async_trait]
pub trait CheckRunner: Send + Sync + 'static {
    async fn execute_check(&self, task: &RetrievalTask) -> Result<Stats, PeerResolutionError>;
}

#[async_trait]
impl CheckRunner for Orchestrator {
    async fn execute_check(&self, task: &RetrievalTask) -> Result<Stats, PeerResolutionError> {
        Orchestrator::execute_check(self, task).await
    }
}

/// Receives the outcome of every completed check
#[async_trait]
pub trait DisputeReporter: Send + Sync + 'static {
    async fn submit_result(&self, task: &RetrievalTask, stats: &Stats) -> Result<(), ReportError>;
}

/// Bulk source of disputes still waiting for a verdict
#[async_trait]
pub trait PendingDisputes: Send + Sync + 'static {
    async fn pending_disputes(&self) -> anyhow::Result<Vec<RetrievalTask>>;
}

/// Hooks into the runtime hosting the checker
pub trait HostActivity: Send + Sync + 'static {
    /// Called once per dispute whose result was submitted
    fn job_completed(&self);

    /// Informational status change
    fn info(&self, message: &str);

    /// Error status change
    fn error(&self, message: &str);
}
