//! Host activity reporting
//!
//! The host is told about health changes only, never about every job.

use std::sync::Arc;

use tracing::{error, info};

use crate::collaborators::HostActivity;

pub const STARTED_MESSAGE: &str = "SPARK started reporting retrievals";
pub const RESUMED_MESSAGE: &str = "SPARK retrieval reporting resumed";
pub const FAILED_MESSAGE: &str = "SPARK failed reporting retrieval";
pub const OUTDATED_MESSAGE: &str =
    "SPARK is outdated. Please upgrade Filecoin Station to the latest version.";

/// Last health state reported to the host
pub struct ActivityState {
    host: Arc<dyn HostActivity>,
    /// `None` until the first report
    healthy: Option<bool>,
}

impl ActivityState {
    pub fn new(host: Arc<dyn HostActivity>) -> Self {
        Self {
            host,
            healthy: None,
        }
    }

    pub fn host(&self) -> &Arc<dyn HostActivity> {
        &self.host
    }

    pub fn on_healthy(&mut self) {
        match self.healthy {
            None => self.host.info(STARTED_MESSAGE),
            Some(false) => self.host.info(RESUMED_MESSAGE),
            Some(true) => return,
        }
        self.healthy = Some(true);
    }

    pub fn on_error(&mut self) {
        self.report_error(FAILED_MESSAGE);
    }

    pub fn on_outdated_client(&mut self) {
        self.report_error(OUTDATED_MESSAGE);
    }

    fn report_error(&mut self, message: &str) {
        if self.healthy != Some(false) {
            self.healthy = Some(false);
            self.host.error(message);
        }
    }
}

/// Host hooks for a standalone process: everything goes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogActivity;

impl HostActivity for LogActivity {
    fn job_completed(&self) {
        info!("Job completed");
    }

    fn info(&self, message: &str) {
        info!(activity = message, "Activity changed");
    }

    fn error(&self, message: &str) {
        error!(activity = message, "Activity changed");
    }
}
