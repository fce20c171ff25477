// Content verification errors

use thiserror::Error;

use crate::SparkError;

/// Result type for content verification
pub type VerifyResult<T> = std::result::Result<T, VerificationError>;

/// Failures while validating a downloaded CAR against the requested CID.
///
/// Every variant is fatal for the verification attempt of the current task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Unsupported hash algorithm 0x{code:x} used by block {cid}")]
    UnsupportedHash { cid: String, code: u64 },

    #[error("Hash of block {cid} does not match its CID")]
    HashMismatch { cid: String },

    #[error("Unexpected block CID {cid}. Expected: {expected}")]
    UnexpectedBlock { cid: String, expected: String },

    #[error("Cannot parse CAR bytes: {0}")]
    CannotParseCar(String),

    #[error("Could not verify complete file structure for CID {cid}")]
    IncompleteDag { cid: String },
}

impl SparkError for VerificationError {
    fn error_code(&self) -> &'static str {
        match self {
            VerificationError::UnsupportedHash { .. } => "UNSUPPORTED_HASH",
            VerificationError::HashMismatch { .. } => "HASH_MISMATCH",
            VerificationError::UnexpectedBlock { .. } => "UNEXPECTED_CAR_BLOCK",
            VerificationError::CannotParseCar(_) => "CANNOT_PARSE_CAR_BYTES",
            VerificationError::IncompleteDag { .. } => "INCOMPLETE_DAG",
        }
    }
}
