//! Dispute Queue
//!
//! Accepts dispute notifications from any source, checks each one with the
//! retrieval orchestrator and hands the outcome to a reporter. At most one
//! check per dispute id runs at a time, and a failing dispute never stops the
//! queue.

pub mod activity;
pub mod collaborators;
pub mod poller;
pub mod queue;

pub use activity::{ActivityState, LogActivity};
pub use collaborators::{CheckRunner, DisputeReporter, HostActivity, PendingDisputes};
pub use poller::DisputePoller;
pub use queue::{DisputeQueue, DisputeQueueHandle, QueueClosed, QueueCounters};
