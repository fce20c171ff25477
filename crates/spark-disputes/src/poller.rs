//! Periodic bulk polling of pending disputes

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::collaborators::PendingDisputes;
use crate::queue::{DisputeQueueHandle, QueueClosed};

/// Feeds the queue from a [`PendingDisputes`] source: once at start, then
/// every `interval` when one is set.
pub struct DisputePoller {
    source: Arc<dyn PendingDisputes>,
    queue: DisputeQueueHandle,
    interval: Option<Duration>,
}

impl DisputePoller {
    pub fn new(
        source: Arc<dyn PendingDisputes>,
        queue: DisputeQueueHandle,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            source,
            queue,
            interval,
        }
    }

    /// Poll until the queue closes, or once if no interval is configured
    pub async fn run(self) {
        let Some(period) = self.interval else {
            if self.poll_once().await.is_err() {
                debug!("Dispute queue closed before the initial poll was queued");
            }
            return;
        };

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.poll_once().await.is_err() {
                info!("Dispute queue closed, stopping poller");
                return;
            }
        }
    }

    /// Fetch pending disputes and enqueue them in order. Returns how many were
    /// queued; source errors are forwarded to the queue.
    pub async fn poll_once(&self) -> Result<usize, QueueClosed> {
        match self.source.pending_disputes().await {
            Ok(disputes) => {
                info!(count = disputes.len(), "Found pending disputes");
                let count = disputes.len();
                for dispute in disputes {
                    self.queue.enqueue(dispute)?;
                }
                Ok(count)
            }
            Err(err) => {
                let message = format!("{:#}", err);
                warn!(error = %message, "Pending disputes poll failed");
                self.queue.report_source_error(message)?;
                Ok(0)
            }
        }
    }
}
