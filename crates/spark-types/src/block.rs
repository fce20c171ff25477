//! Verified content blocks

use bytes::Bytes;
use cid::Cid;

/// A block whose bytes hashed to its CID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub cid: Cid,
    pub bytes: Bytes,
}

impl Block {
    pub fn new(cid: Cid, bytes: impl Into<Bytes>) -> Self {
        Self {
            cid,
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Summary of a successful content verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub valid: bool,

    /// The block accepted as the requested content
    pub root_block: Block,

    pub total_blocks: usize,

    /// Sum of all block payload sizes
    pub total_size: u64,
}
