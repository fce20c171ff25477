//! Peer Resolver
//!
//! Maps a storage provider (miner) id to the peer id of its index provider.
//! Several sources can be configured; they are queried concurrently, each one
//! inside its own time box, and the first non-empty answer in priority order
//! wins.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use spark_error::{PeerIdLookupError, PeerResolutionError, RpcError, SparkError};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{PeerIdConfig, PeerIdSourceOrder};
use crate::retry::{retry, RetryConfig};
use crate::rpc::RpcClient;

//-----------------------------------------------------------------------------
// Traits
//-----------------------------------------------------------------------------

/// Resolves a miner id to a peer id
#[async_trait]
pub trait PeerIdResolver: Send + Sync {
    async fn resolve_peer_id(&self, miner_id: &str) -> Result<String, PeerResolutionError>;
}

/// A single place a peer id can be looked up.
///
/// `Ok(None)` means the source answered but knows no peer id for the miner.
#[async_trait]
pub trait PeerIdSource: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, miner_id: &str) -> Result<Option<String>, PeerIdLookupError>;
}

/// On-chain miner to peer-id mapping contract, implemented by the chain client
#[async_trait]
pub trait PeerIdContract: Send + Sync {
    /// Returns the stored peer id, empty when none is registered
    async fn get_peer_id(&self, miner_id: u64) -> anyhow::Result<String>;
}

//-----------------------------------------------------------------------------
// Miner Info Source
//-----------------------------------------------------------------------------

/// Reads `PeerId` from `StateMinerInfo` at the current chain head
pub struct MinerInfoSource {
    rpc: RpcClient,
    retry: RetryConfig,
}

impl MinerInfoSource {
    pub fn new(rpc: RpcClient, retry: RetryConfig) -> Self {
        Self { rpc, retry }
    }
}

#[async_trait]
impl PeerIdSource for MinerInfoSource {
    fn name(&self) -> &str {
        "FilecoinMinerInfo"
    }

    async fn lookup(&self, miner_id: &str) -> Result<Option<String>, PeerIdLookupError> {
        let chain_head = retry(&self.retry, "Filecoin.ChainHead", |err: &RpcError| err.is_transient(), || {
            self.rpc.chain_head()
        })
        .await
        .map_err(PeerIdLookupError::ChainHead)?;

        let info = retry(&self.retry, "Filecoin.StateMinerInfo", |err: &RpcError| err.is_transient(), || {
            self.rpc.state_miner_info(miner_id, &chain_head)
        })
        .await
        .map_err(|source| PeerIdLookupError::MinerInfo {
            miner_id: miner_id.to_string(),
            source,
        })?;

        Ok(info.peer_id.filter(|peer_id| !peer_id.is_empty()))
    }
}

//-----------------------------------------------------------------------------
// Contract Source
//-----------------------------------------------------------------------------

/// Adapts a [`PeerIdContract`] to the source interface
pub struct ContractSource<C> {
    contract: C,
}

impl<C: PeerIdContract> ContractSource<C> {
    pub fn new(contract: C) -> Self {
        Self { contract }
    }
}

/// Parse the numeric part of an `f0<number>` miner id
pub fn parse_miner_number(miner_id: &str) -> Result<u64, PeerIdLookupError> {
    let invalid = || PeerIdLookupError::InvalidMinerId(miner_id.to_string());
    miner_id
        .strip_prefix("f0")
        .ok_or_else(invalid)?
        .parse()
        .map_err(|_| invalid())
}

#[async_trait]
impl<C: PeerIdContract> PeerIdSource for ContractSource<C> {
    fn name(&self) -> &str {
        "MinerPeerIDMapping contract"
    }

    async fn lookup(&self, miner_id: &str) -> Result<Option<String>, PeerIdLookupError> {
        let number = parse_miner_number(miner_id)?;
        let peer_id = self
            .contract
            .get_peer_id(number)
            .await
            .map_err(|err| PeerIdLookupError::Contract {
                miner_id: miner_id.to_string(),
                message: format!("{:#}", err),
            })?;

        Ok(Some(peer_id).filter(|peer_id| !peer_id.is_empty()))
    }
}

//-----------------------------------------------------------------------------
// Resolver
//-----------------------------------------------------------------------------

/// Priority-ordered, concurrently queried set of peer-id sources
pub struct PeerResolver {
    sources: Vec<Arc<dyn PeerIdSource>>,
    source_timeout: Duration,
}

impl PeerResolver {
    /// Sources are given highest priority first
    pub fn new(sources: Vec<Arc<dyn PeerIdSource>>, source_timeout: Duration) -> Self {
        Self {
            sources,
            source_timeout,
        }
    }

    /// Arrange the sources according to the configured order. The contract
    /// source is ignored for `MinerInfoOnly` or when absent.
    pub fn from_config(
        config: &PeerIdConfig,
        miner_info: Arc<dyn PeerIdSource>,
        contract: Option<Arc<dyn PeerIdSource>>,
    ) -> Self {
        let sources = match (config.order, contract) {
            (PeerIdSourceOrder::ContractFirst, Some(contract)) => vec![contract, miner_info],
            (PeerIdSourceOrder::MinerInfoFirst, Some(contract)) => vec![miner_info, contract],
            _ => vec![miner_info],
        };
        Self::new(sources, config.source_timeout())
    }

    async fn query(
        &self,
        source: &Arc<dyn PeerIdSource>,
        miner_id: &str,
    ) -> Result<Option<String>, PeerIdLookupError> {
        match timeout(self.source_timeout, source.lookup(miner_id)).await {
            Ok(result) => result,
            Err(_) => Err(PeerIdLookupError::TimedOut {
                source_name: source.name().to_string(),
                timeout_ms: self.source_timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl PeerIdResolver for PeerResolver {
    async fn resolve_peer_id(&self, miner_id: &str) -> Result<String, PeerResolutionError> {
        let results = join_all(
            self.sources
                .iter()
                .map(|source| self.query(source, miner_id)),
        )
        .await;

        let mut failures = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(Some(peer_id)) => {
                    info!(miner_id, source = source.name(), %peer_id, "Using PeerID");
                    return Ok(peer_id);
                }
                Ok(None) => debug!(miner_id, source = source.name(), "Source has no PeerID"),
                Err(err) => {
                    warn!(miner_id, source = source.name(), error = %err, "PeerID lookup failed");
                    failures.push((source.name().to_string(), err));
                }
            }
        }

        Err(PeerResolutionError {
            miner_id: miner_id.to_string(),
            failures,
        })
    }
}

/// Resolver that always answers with the same peer id
#[derive(Debug, Clone)]
pub struct FixedPeerId(pub String);

#[async_trait]
impl PeerIdResolver for FixedPeerId {
    async fn resolve_peer_id(&self, _miner_id: &str) -> Result<String, PeerResolutionError> {
        Ok(self.0.clone())
    }
}
