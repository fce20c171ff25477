// Chain RPC and peer-id resolution errors

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::SparkError;

/// Result type for JSON-RPC calls
pub type RpcResult<T> = std::result::Result<T, RpcError>;

/// Errors returned by the chain JSON-RPC client.
///
/// `Rpc` is the server answering with a JSON-RPC `error` object. It is kept apart
/// from the transport variants: it points at a bad request on our side rather than
/// at an unavailable endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("JSON RPC failed with {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{0}")]
    Transport(String),

    #[error("{message}")]
    Rpc { code: Option<i64>, message: String },

    #[error("Invalid JSON RPC response: {0}")]
    InvalidResponse(String),
}

impl SparkError for RpcError {
    fn error_code(&self) -> &'static str {
        match self {
            RpcError::Http { .. } => "JSON_RPC_HTTP_ERROR",
            RpcError::Transport(_) => "JSON_RPC_TRANSPORT_ERROR",
            RpcError::Rpc { .. } => "FILECOIN_RPC_ERROR",
            RpcError::InvalidResponse(_) => "JSON_RPC_INVALID_RESPONSE",
        }
    }

    fn is_transient(&self) -> bool {
        matches!(self, RpcError::Http { .. } | RpcError::Transport(_))
    }
}

/// A failure of one peer-id source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerIdLookupError {
    #[error("Cannot obtain chain head: {0}")]
    ChainHead(RpcError),

    #[error("Cannot obtain miner info for {miner_id}: {source}")]
    MinerInfo { miner_id: String, source: RpcError },

    #[error("minerID must be \"f0{{number}}\". Actual value: \"{0}\"")]
    InvalidMinerId(String),

    #[error("Error fetching peer ID from contract for miner {miner_id}: {message}")]
    Contract { miner_id: String, message: String },

    #[error("{source_name} did not answer within {timeout_ms}ms")]
    TimedOut { source_name: String, timeout_ms: u64 },
}

impl PeerIdLookupError {
    /// The underlying RPC error, if this failure came from the chain endpoint
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            PeerIdLookupError::ChainHead(err) => Some(err),
            PeerIdLookupError::MinerInfo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl SparkError for PeerIdLookupError {
    fn error_code(&self) -> &'static str {
        match self {
            PeerIdLookupError::ChainHead(err) | PeerIdLookupError::MinerInfo { source: err, .. } => {
                err.error_code()
            }
            PeerIdLookupError::InvalidMinerId(_) => "INVALID_MINER_ID",
            PeerIdLookupError::Contract { .. } => "CONTRACT_LOOKUP_FAILED",
            PeerIdLookupError::TimedOut { .. } => "PEER_ID_SOURCE_TIMEOUT",
        }
    }

    fn is_transient(&self) -> bool {
        match self.rpc_error() {
            Some(err) => err.is_transient(),
            None => matches!(self, PeerIdLookupError::TimedOut { .. }),
        }
    }
}

/// Raised when no configured source produced a peer id for a miner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerResolutionError {
    /// The miner whose peer id was requested
    pub miner_id: String,

    /// Failures reported by individual sources, in priority order
    pub failures: Vec<(String, PeerIdLookupError)>,
}

impl PeerResolutionError {
    /// Create an error with no per-source failures: every source answered empty
    pub fn empty(miner_id: impl Into<String>) -> Self {
        Self {
            miner_id: miner_id.into(),
            failures: Vec::new(),
        }
    }

    /// True when a source got a JSON-RPC error object back.
    ///
    /// Those are not routine unavailability and deserve to be reported.
    pub fn is_unexpected(&self) -> bool {
        self.failures.iter().any(|(_, err)| {
            matches!(err.rpc_error(), Some(RpcError::Rpc { .. }))
        })
    }
}

impl fmt::Display for PeerResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error fetching PeerID for miner {}.", self.miner_id)?;
        if self.failures.is_empty() {
            write!(f, " Failed to obtain Miner's Index Provider PeerID.")?;
        }
        for (source, err) in &self.failures {
            write!(f, "\n  {}: {}", source, err)?;
        }
        Ok(())
    }
}

impl StdError for PeerResolutionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.failures
            .first()
            .map(|(_, err)| err as &(dyn StdError + 'static))
    }
}

impl SparkError for PeerResolutionError {
    fn error_code(&self) -> &'static str {
        "PEER_ID_RESOLUTION_FAILED"
    }

    fn is_transient(&self) -> bool {
        !self.failures.is_empty() && self.failures.iter().all(|(_, err)| err.is_transient())
    }
}
