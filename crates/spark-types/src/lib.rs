//! Spark Types: data model shared by the retrieval checker crates.
//!
//! ## Module Organization
//!
//! * **Tasks**: the unit of verification work (`task`)
//! * **Providers**: index query results and retrieval protocols (`provider`)
//! * **Statistics**: the per-task measurement record (`stats`)
//! * **Blocks**: verified content and the verification summary (`block`)

pub mod block;
pub mod provider;
pub mod stats;
pub mod task;

pub use block::{Block, VerificationResult};
pub use provider::{IndexerResult, Protocol, Provider, ProviderResult};
pub use stats::{DisputeOutcome, Stats};
pub use task::RetrievalTask;

/// Version string of the checker, reported alongside measurements
pub const SPARK_VERSION: &str = "1.19.1";
