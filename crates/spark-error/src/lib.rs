// Spark Error Handling
// Error types for every stage of a retrieval check, plus the stable status-code table

use std::error::Error as StdError;

// Re-export common error handling tools for convenience
pub use anyhow;
pub use thiserror;

// Module structure
mod conversion;
mod status;

// Include sub-modules
mod multiaddr;
mod peer;
mod report;
mod retrieval;
mod verification;

// Public exports (Consolidated)
pub use conversion::{error_chain_message, transport_error};
pub use multiaddr::{MultiaddrError, MultiaddrResult};
pub use peer::{PeerIdLookupError, PeerResolutionError, RpcError, RpcResult};
pub use report::{CheckError, ReportError, OUTDATED_CLIENT_MESSAGE};
pub use retrieval::{RetrievalError, RetrievalResult, TimeoutKind};
pub use status::{classify, classify_message, status_for_code, StatusCode, TRANSPORT_PATTERNS};
pub use verification::{VerificationError, VerifyResult};

/// Base trait for all errors raised while checking a retrieval.
///
/// `error_code` is the stable, machine-readable identity of a failure. The status
/// classifier is keyed on it, so codes must never be renamed.
pub trait SparkError: StdError + Send + Sync + 'static {
    /// Returns a unique static string code for this error.
    fn error_code(&self) -> &'static str;

    /// Indicates if the error is temporary and retrying might succeed.
    fn is_transient(&self) -> bool {
        false
    }

    /// Maps this error to its numeric status code.
    fn status_code(&self) -> u16
    where
        Self: Sized,
    {
        classify(self)
    }
}
