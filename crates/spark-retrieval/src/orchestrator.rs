//! Verification Orchestrator
//!
//! Runs the full check for one task: peer resolution, index query, then the
//! retrieval itself and, for HTTP providers, the HEAD check.

use std::sync::Arc;

use anyhow::{Context, Result};
use spark_error::PeerResolutionError;
use spark_types::{Protocol, RetrievalTask, Stats};
use tracing::{error, info};

use crate::checker::RetrievalChecker;
use crate::config::SparkConfig;
use crate::ipni::IndexerClient;
use crate::peer_id::{MinerInfoSource, PeerIdResolver, PeerIdSource, PeerResolver};
use crate::rpc::RpcClient;

const ISSUES_URL: &str = "https://github.com/filecoin-station/spark/issues/new";

pub struct Orchestrator {
    peer_resolver: Arc<dyn PeerIdResolver>,
    indexer: IndexerClient,
    checker: RetrievalChecker,
}

impl Orchestrator {
    pub fn new(
        peer_resolver: Arc<dyn PeerIdResolver>,
        indexer: IndexerClient,
        checker: RetrievalChecker,
    ) -> Self {
        Self {
            peer_resolver,
            indexer,
            checker,
        }
    }

    /// Build every client from configuration. `contract` is the optional
    /// on-chain peer-id source.
    pub fn from_config(config: &SparkConfig, contract: Option<Arc<dyn PeerIdSource>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("spark-checker/{}", spark_types::SPARK_VERSION))
            .build()
            .context("Cannot build HTTP client")?;

        let miner_info: Arc<dyn PeerIdSource> = Arc::new(MinerInfoSource::new(
            RpcClient::new(http.clone(), &config.rpc),
            config.rpc.retry.clone(),
        ));
        let resolver = PeerResolver::from_config(&config.peer_id, miner_info, contract);

        Ok(Self::new(
            Arc::new(resolver),
            IndexerClient::new(http.clone(), &config.indexer),
            RetrievalChecker::new(http, config.retrieval.clone()),
        ))
    }

    /// Replace the peer resolver, e.g. with a fixed peer id for manual checks
    pub fn with_peer_resolver(mut self, peer_resolver: Arc<dyn PeerIdResolver>) -> Self {
        self.peer_resolver = peer_resolver;
        self
    }

    pub fn checker(&self) -> &RetrievalChecker {
        &self.checker
    }

    /// Check one task.
    ///
    /// Peer-resolution failures abort the check and no measurement is produced.
    /// Index and retrieval failures are recorded in the returned [`Stats`].
    pub async fn execute_check(&self, task: &RetrievalTask) -> Result<Stats, PeerResolutionError> {
        let mut stats = Stats::new();

        info!(miner_id = %task.miner_id, "Calling Filecoin JSON-RPC to get PeerId of miner");
        let peer_id = match self.peer_resolver.resolve_peer_id(&task.miner_id).await {
            Ok(peer_id) => peer_id,
            Err(err) => {
                if err.is_unexpected() {
                    error!(
                        miner_id = %task.miner_id,
                        "The error printed below was not expected, please report it on GitHub: {}",
                        ISSUES_URL
                    );
                }
                error!(miner_id = %task.miner_id, error = %err, "Cannot resolve PeerID, aborting check");
                return Err(err);
            }
        };
        info!(%peer_id, "Found peer id");
        stats.provider_id = Some(peer_id.clone());

        info!(cid = %task.cid, "Querying IPNI to find retrieval providers");
        let result = self.indexer.query_index(&task.cid, &peer_id).await;
        stats.indexer_result = Some(result.indexer_result);

        let provider = match result.provider {
            Some(provider) if result.indexer_result.provider_found() => provider,
            _ => return Ok(stats),
        };
        stats.protocol = Some(provider.protocol);
        stats.provider_address = Some(provider.address.clone());

        self.checker
            .check_retrieval(provider.protocol, &provider.address, &task.cid, &mut stats)
            .await;
        if provider.protocol == Protocol::Http {
            self.checker
                .test_head_request(&provider.address, &task.cid, &mut stats)
                .await;
        }

        Ok(stats)
    }
}
