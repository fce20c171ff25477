//! Spark Retrieval: the retrieval verification engine.
//!
//! Given a CID and a storage provider id this crate finds out whether the
//! provider serves verifiable content for that CID:
//!
//! * **Peer resolution** (`rpc`, `peer_id`): miner id to index-provider peer id
//! * **Index queries** (`ipni`): peer id and CID to a retrieval endpoint
//! * **Address translation** (`multiaddr`): multiaddr to HTTP(S) URL
//! * **Content verification** (`car`, `dag`, `verify`, `checker`): bounded
//!   streaming download and block-by-block hash validation
//! * **Orchestration** (`orchestrator`): the full check for one task
//!
//! Clients are constructed once from [`SparkConfig`] and shared by reference.

pub mod car;
pub mod checker;
pub mod config;
pub mod dag;
pub mod ipni;
pub mod multiaddr;
pub mod orchestrator;
pub mod peer_id;
pub mod retry;
pub mod rpc;
pub mod verify;

pub use checker::{retrieval_url, RetrievalChecker};
pub use config::{
    IndexerConfig, LoggingConfig, PeerIdConfig, PeerIdSourceOrder, QueueConfig, RetrievalConfig,
    RpcConfig, SparkConfig, MAX_CAR_SIZE, MAX_REQUEST_DURATION_MS,
};
pub use ipni::IndexerClient;
pub use multiaddr::multiaddr_to_http_url;
pub use orchestrator::Orchestrator;
pub use peer_id::{
    ContractSource, FixedPeerId, MinerInfoSource, PeerIdContract, PeerIdResolver, PeerIdSource,
    PeerResolver,
};
pub use retry::{retry, RetryConfig};
pub use rpc::RpcClient;
pub use verify::{validate_block, verify_content, verify_raw_block, VerificationScope};
