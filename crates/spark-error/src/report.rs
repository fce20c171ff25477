// Reporting and task-level errors

use thiserror::Error;

use crate::{PeerResolutionError, SparkError};

/// Server message the reporting API answers with when this checker is too old
pub const OUTDATED_CLIENT_MESSAGE: &str = "OUTDATED CLIENT";

/// Failure to hand a verification outcome to the reporting collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error submitting dispute result for dispute {dispute_id}: {message}")]
pub struct ReportError {
    pub dispute_id: String,
    pub message: String,
    /// HTTP status returned by the reporting endpoint, if any
    pub status: Option<u16>,
    /// Response body returned by the reporting endpoint, if any
    pub server_message: Option<String>,
}

impl ReportError {
    pub fn new(dispute_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dispute_id: dispute_id.into(),
            message: message.into(),
            status: None,
            server_message: None,
        }
    }

    /// Attach the HTTP response the reporting endpoint answered with
    pub fn with_response(mut self, status: u16, server_message: impl Into<String>) -> Self {
        self.status = Some(status);
        self.server_message = Some(server_message.into());
        self
    }

    pub fn is_outdated_client(&self) -> bool {
        self.status == Some(400) && self.server_message.as_deref() == Some(OUTDATED_CLIENT_MESSAGE)
    }
}

impl SparkError for ReportError {
    fn error_code(&self) -> &'static str {
        "REPORT_FAILED"
    }
}

/// Errors that abort the processing of a single dispute
#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    PeerResolution(#[from] PeerResolutionError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl CheckError {
    /// The "outdated client" condition is signaled to the host separately
    pub fn is_outdated_client(&self) -> bool {
        match self {
            CheckError::Report(err) => err.is_outdated_client(),
            CheckError::PeerResolution(_) => false,
        }
    }
}

impl SparkError for CheckError {
    fn error_code(&self) -> &'static str {
        match self {
            CheckError::PeerResolution(err) => err.error_code(),
            CheckError::Report(err) => err.error_code(),
        }
    }
}
