//! Per-task measurement record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{IndexerResult, Protocol};

/// Measurements collected while checking a single task.
///
/// A fresh record is created per task. `byte_length` only grows,
/// `car_too_large` never reverts once set, `first_byte_at` is recorded on the
/// first chunk only and a terminal failure code never replaces a status that
/// is already set to something other than 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub start_at: DateTime<Utc>,
    pub first_byte_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,

    /// Response status of the retrieval, or a classified failure code
    pub status_code: Option<u16>,

    /// Status of the HEAD request (HTTP retrievals only)
    pub head_status_code: Option<u16>,

    pub indexer_result: Option<IndexerResult>,
    pub protocol: Option<Protocol>,
    pub provider_id: Option<String>,
    pub provider_address: Option<String>,

    /// Total bytes received from the retrieval endpoint
    pub byte_length: u64,

    /// Set once the payload crossed the size limit
    pub car_too_large: bool,

    /// Set when the idle timer or the request deadline fired
    pub timeout: bool,

    /// Multihash-prefixed sha2-256 of the whole payload, hex encoded
    pub car_checksum: Option<String>,

    /// Whether the whole DAG was requested rather than the root block
    pub full_verification: bool,
}

impl Stats {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(start_at: DateTime<Utc>) -> Self {
        Self {
            start_at,
            first_byte_at: None,
            end_at: None,
            status_code: None,
            head_status_code: None,
            indexer_result: None,
            protocol: None,
            provider_id: None,
            provider_address: None,
            byte_length: 0,
            car_too_large: false,
            timeout: false,
            car_checksum: None,
            full_verification: false,
        }
    }

    /// Record the first byte time unless already known
    pub fn mark_first_byte(&mut self) {
        if self.first_byte_at.is_none() {
            self.first_byte_at = Some(Utc::now());
        }
    }

    /// Account for a received chunk and return whether the payload is now
    /// above `max_size`.
    pub fn record_chunk(&mut self, len: usize, max_size: u64) -> bool {
        self.mark_first_byte();
        self.byte_length = self.byte_length.saturating_add(len as u64);
        if self.byte_length > max_size {
            self.car_too_large = true;
        }
        self.car_too_large
    }

    /// Store a failure code unless the retrieval already ended with a
    /// non-success status.
    pub fn record_failure(&mut self, code: u16) {
        match self.status_code {
            None | Some(200) => self.status_code = Some(code),
            Some(_) => {}
        }
    }

    pub fn finish(&mut self) {
        self.end_at = Some(Utc::now());
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Final determination handed to the dispute reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeOutcome {
    /// The provider served verifiable content
    Resolved,
    Failed,
}

impl From<&Stats> for DisputeOutcome {
    fn from(stats: &Stats) -> Self {
        if stats.status_code == Some(200) {
            DisputeOutcome::Resolved
        } else {
            DisputeOutcome::Failed
        }
    }
}
