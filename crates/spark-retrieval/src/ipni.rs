//! Content-routing index client
//!
//! Looks up every advertisement for a CID and picks the retrieval endpoint
//! advertised by the provider under test.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use spark_error::error_chain_message;
use spark_types::{IndexerResult, Protocol, Provider, ProviderResult};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::IndexerConfig;
use crate::retry::{retry, RetryConfig};

/// Characters left alone by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

// Transport codes found in the varint prefix of advertisement metadata
const TRANSPORT_BITSWAP: u64 = 0x0900;
const TRANSPORT_GRAPHSYNC_FILECOINV1: u64 = 0x0910;
const TRANSPORT_IPFS_GATEWAY_HTTP: u64 = 0x0920;
const TRANSPORT_GRAPHSYNC_LEGACY: u64 = 4_128_768;

//-----------------------------------------------------------------------------
// Wire Types
//-----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FindResponse {
    #[serde(default)]
    multihash_results: Vec<MultihashResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MultihashResult {
    #[serde(default)]
    provider_results: Vec<ProviderRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProviderRecord {
    provider: AddrInfo,
    #[serde(default)]
    metadata: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddrInfo {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    addrs: Vec<String>,
}

#[derive(Debug, Error)]
enum FetchError {
    #[error("Index responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Transport(String),
}

//-----------------------------------------------------------------------------
// Index Client
//-----------------------------------------------------------------------------

/// Client for the content-routing index (`cid.contact` compatible)
#[derive(Debug, Clone)]
pub struct IndexerClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl IndexerClient {
    pub fn new(http: reqwest::Client, config: &IndexerConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
        }
    }

    /// Find the endpoint advertised by `provider_peer_id` for `cid`.
    ///
    /// Never fails: an unreachable index is reported through `indexer_result`.
    pub async fn query_index(&self, cid: &str, provider_peer_id: &str) -> ProviderResult {
        let records = match retry(
            &self.retry,
            "index query",
            |err: &FetchError| matches!(err, FetchError::Status { status, .. } if *status >= 500),
            || self.fetch_provider_records(cid),
        )
        .await
        {
            Ok(records) => records,
            Err(err) => {
                warn!(cid, error = %err, "IPNI query failed");
                let result = match err {
                    FetchError::Status { status, .. } => IndexerResult::Error(status),
                    FetchError::Transport(_) => IndexerResult::ErrorFetch,
                };
                return ProviderResult::without_provider(result);
            }
        };
        info!(cid, count = records.len(), "IPNI returned provider results");

        select_provider(&records, provider_peer_id)
    }

    async fn fetch_provider_records(&self, cid: &str) -> Result<Vec<ProviderRecord>, FetchError> {
        let url = format!(
            "{}/cid/{}",
            self.base_url,
            utf8_percent_encode(cid, URI_COMPONENT)
        );
        debug!(%url, "Querying IPNI");

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| FetchError::Transport(error_chain_message(&err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.trim_end().to_string(),
            });
        }

        let body: FindResponse = response
            .json()
            .await
            .map_err(|err| FetchError::Transport(error_chain_message(&err)))?;

        Ok(body
            .multihash_results
            .into_iter()
            .flat_map(|result| result.provider_results)
            .collect())
    }
}

fn select_provider(records: &[ProviderRecord], provider_peer_id: &str) -> ProviderResult {
    let mut graphsync_provider: Option<Provider> = None;

    for record in records {
        if record.provider.id != provider_peer_id {
            continue;
        }

        let protocol = match decode_protocol(record.metadata.as_deref().unwrap_or_default()) {
            Ok(protocol) => protocol,
            Err(err) => {
                warn!(provider_id = %record.provider.id, error = %err, "Skipping advertisement with malformed metadata");
                continue;
            }
        };

        let Some(address) = record.provider.addrs.first() else {
            continue;
        };

        match protocol {
            Some(Protocol::Http) => {
                return ProviderResult {
                    indexer_result: IndexerResult::Ok,
                    provider: Some(Provider {
                        address: address.clone(),
                        protocol: Protocol::Http,
                    }),
                };
            }
            Some(Protocol::Graphsync) if graphsync_provider.is_none() => {
                graphsync_provider = Some(Provider {
                    address: format!("{}/p2p/{}", address, record.provider.id),
                    protocol: Protocol::Graphsync,
                });
            }
            _ => {}
        }
    }

    match graphsync_provider {
        Some(provider) => {
            info!("HTTP protocol is not advertised, falling back to Graphsync");
            ProviderResult {
                indexer_result: IndexerResult::HttpNotAdvertised,
                provider: Some(provider),
            }
        }
        None => {
            info!("All advertisements are from other miners or for unsupported protocols");
            ProviderResult::without_provider(IndexerResult::NoValidAdvertisement)
        }
    }
}

/// Decode the transport protocol from base64 advertisement metadata.
///
/// Returns `Ok(None)` for well-formed metadata naming a transport we do not use.
pub fn decode_protocol(metadata: &str) -> Result<Option<Protocol>, String> {
    let bytes = STANDARD
        .decode(metadata)
        .map_err(|err| format!("invalid base64 metadata: {}", err))?;
    let (code, _) = unsigned_varint::decode::u64(&bytes)
        .map_err(|err| format!("invalid metadata varint: {}", err))?;

    Ok(match code {
        TRANSPORT_BITSWAP => Some(Protocol::Bitswap),
        TRANSPORT_GRAPHSYNC_FILECOINV1 | TRANSPORT_GRAPHSYNC_LEGACY => Some(Protocol::Graphsync),
        TRANSPORT_IPFS_GATEWAY_HTTP => Some(Protocol::Http),
        _ => None,
    })
}
