// Retrieval errors
// Everything that can go wrong between picking a provider and verifying its response

use std::fmt;

use thiserror::Error;

use crate::{MultiaddrError, SparkError, VerificationError};

/// Result type for retrieval checks
pub type RetrievalResult<T> = std::result::Result<T, RetrievalError>;

/// Which of the two download timers fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No data arrived within the idle window
    Idle,
    /// The hard deadline measured from the start of the check passed
    Deadline,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Idle => write!(f, "idle timeout"),
            TimeoutKind::Deadline => write!(f, "request deadline"),
        }
    }
}

/// Errors raised by the content verifier and the HEAD request
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error(transparent)]
    Multiaddr(#[from] MultiaddrError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Transport failure, rendered with its whole cause chain
    #[error("{0}")]
    Transport(String),

    #[error("Retrieval aborted: {kind} after {after_ms}ms")]
    Timeout { kind: TimeoutKind, after_ms: u64 },

    #[error("Received empty CAR file")]
    EmptyBody,

    #[error("Cannot fetch \"{url}\": no HTTP gateway configured for protocol \"{protocol}\"")]
    UnsupportedProtocol { protocol: String, url: String },
}

impl RetrievalError {
    /// Whether this error was produced by one of the download timers
    pub fn is_timeout(&self) -> bool {
        matches!(self, RetrievalError::Timeout { .. })
    }
}

impl SparkError for RetrievalError {
    fn error_code(&self) -> &'static str {
        match self {
            RetrievalError::Multiaddr(err) => err.error_code(),
            RetrievalError::Verification(err) => err.error_code(),
            RetrievalError::Transport(_) => "FETCH_FAILED",
            RetrievalError::Timeout { .. } => "TIMEOUT",
            RetrievalError::EmptyBody => "EMPTY_CAR",
            RetrievalError::UnsupportedProtocol { .. } => "UNSUPPORTED_RETRIEVAL_PROTOCOL",
        }
    }

    fn is_transient(&self) -> bool {
        matches!(
            self,
            RetrievalError::Transport(_) | RetrievalError::Timeout { .. }
        )
    }
}
