//! Content Verifier
//!
//! Downloads the content of a CID from a provider under two timers, an idle
//! timer reset whenever data arrives and a hard deadline for the whole
//! request. The payload is then validated block by block and summarized in
//! [`Stats`].

use std::future::Future;
use std::time::Duration;

use bytes::BytesMut;
use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use sha2::{Digest, Sha256};
use spark_error::{transport_error, RetrievalError, RetrievalResult, SparkError, TimeoutKind};
use spark_types::{Protocol, Stats};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::config::RetrievalConfig;
use crate::multiaddr::multiaddr_to_http_url;
use crate::verify::{verify_content, verify_raw_block, VerificationScope};

pub const CAR_CONTENT_TYPE: &str = "application/vnd.ipld.car";
pub const RAW_CONTENT_TYPE: &str = "application/vnd.ipld.raw";

const BLOCK_SCOPE_QUERY: &str = "?dag-scope=block";

/// Multihash prefix of sha2-256 digests: code 0x12, length 32
const SHA2_256_PREFIX: &str = "1220";

/// Build the block-scope retrieval URL for a provider.
///
/// HTTP providers get `<base>/ipfs/<cid>?dag-scope=block`; anything else gets an
/// `ipfs://` URL naming the protocol and provider.
pub fn retrieval_url(protocol: Protocol, address: &str, cid: &str) -> RetrievalResult<String> {
    match protocol {
        Protocol::Http => {
            let base_url = multiaddr_to_http_url(address)?;
            Ok(format!("{}/ipfs/{}{}", base_url, cid, BLOCK_SCOPE_QUERY))
        }
        _ => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("protocols", protocol.as_str())
                .append_pair("providers", address)
                .finish();
            Ok(format!("ipfs://{}?{}", cid, query))
        }
    }
}

/// Streaming retrieval checker
#[derive(Debug, Clone)]
pub struct RetrievalChecker {
    http: reqwest::Client,
    config: RetrievalConfig,
}

/// Both download timers, created once per retrieval
struct Timers {
    deadline: Instant,
    max_duration: Duration,
    idle: Duration,
}

impl Timers {
    fn start(config: &RetrievalConfig) -> Self {
        Self {
            deadline: Instant::now() + config.max_request_duration(),
            max_duration: config.max_request_duration(),
            idle: config.idle_timeout(),
        }
    }

    /// Run `fut` with a fresh idle window and the shared deadline
    async fn run<F: Future>(&self, fut: F) -> RetrievalResult<F::Output> {
        let idle_deadline = Instant::now() + self.idle;
        tokio::select! {
            output = fut => Ok(output),
            _ = sleep_until(idle_deadline) => Err(RetrievalError::Timeout {
                kind: TimeoutKind::Idle,
                after_ms: self.idle.as_millis() as u64,
            }),
            _ = sleep_until(self.deadline) => Err(RetrievalError::Timeout {
                kind: TimeoutKind::Deadline,
                after_ms: self.max_duration.as_millis() as u64,
            }),
        }
    }
}

impl RetrievalChecker {
    pub fn new(http: reqwest::Client, config: RetrievalConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve `cid` from the provider and record the outcome in `stats`.
    ///
    /// Failures never escape: they are classified into `stats.status_code`.
    pub async fn check_retrieval(
        &self,
        protocol: Protocol,
        address: &str,
        cid: &str,
        stats: &mut Stats,
    ) {
        stats.start_at = Utc::now();
        stats.full_verification = self.config.full_verification;

        if let Err(err) = self.retrieve(protocol, address, cid, stats).await {
            if err.is_timeout() {
                stats.timeout = true;
            }
            stats.record_failure(err.status_code());
            warn!(
                cid,
                address,
                %protocol,
                error = %err,
                code = err.error_code(),
                status_code = ?stats.status_code,
                byte_length = stats.byte_length,
                "Retrieval check failed"
            );
        }

        stats.finish();
        info!(
            cid,
            status_code = ?stats.status_code,
            byte_length = stats.byte_length,
            timeout = stats.timeout,
            car_too_large = stats.car_too_large,
            checksum = ?stats.car_checksum,
            "Retrieval check completed"
        );
    }

    async fn retrieve(
        &self,
        protocol: Protocol,
        address: &str,
        cid: &str,
        stats: &mut Stats,
    ) -> RetrievalResult<()> {
        let url = retrieval_url(protocol, address, cid)?;
        let fetch_url = self.fetch_url(protocol, &url)?;
        let scope = if self.config.full_verification {
            VerificationScope::Full
        } else {
            VerificationScope::Block
        };
        info!(cid, %protocol, url = %fetch_url, "Starting CAR retrieval");

        let timers = Timers::start(&self.config);
        let response = timers
            .run(self.http.get(&fetch_url).header(ACCEPT, CAR_CONTENT_TYPE).send())
            .await?
            .map_err(transport_error)?;

        let status = response.status();
        stats.status_code = Some(status.as_u16());
        if !status.is_success() {
            let body = timers
                .run(response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            warn!(
                cid,
                status_code = status.as_u16(),
                body = body.trim_end(),
                "CAR retrieval failed"
            );
            return Ok(());
        }

        let is_raw_block = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(RAW_CONTENT_TYPE));

        let mut response = response;
        let mut body = BytesMut::new();
        let mut hasher = Sha256::new();
        while let Some(chunk) = timers.run(response.chunk()).await?.map_err(transport_error)? {
            let was_too_large = stats.car_too_large;
            if stats.record_chunk(chunk.len(), self.config.max_car_size) && !was_too_large {
                warn!(
                    cid,
                    max_car_size = self.config.max_car_size,
                    "CAR size exceeded the limit, continuing download"
                );
            }
            hasher.update(&chunk);
            body.extend_from_slice(&chunk);
            debug!(cid, chunk = chunk.len(), total = stats.byte_length, "Chunk received");
        }

        if body.is_empty() {
            return Err(RetrievalError::EmptyBody);
        }

        let result = if is_raw_block {
            verify_raw_block(cid, &body)?
        } else {
            verify_content(cid, &body, scope)?
        };
        info!(
            cid,
            root_block = %result.root_block.cid,
            total_blocks = result.total_blocks,
            total_size = result.total_size,
            "Content verification successful"
        );

        stats.car_checksum = Some(format!("{}{}", SHA2_256_PREFIX, hex::encode(hasher.finalize())));
        Ok(())
    }

    /// Turn a retrieval URL into the URL that is actually fetched
    fn fetch_url(&self, protocol: Protocol, url: &str) -> RetrievalResult<String> {
        if protocol == Protocol::Http {
            return Ok(if self.config.full_verification {
                url.replacen(BLOCK_SCOPE_QUERY, "", 1)
            } else {
                url.to_string()
            });
        }

        let Some(lassie_url) = &self.config.lassie_url else {
            return Err(RetrievalError::UnsupportedProtocol {
                protocol: protocol.to_string(),
                url: url.to_string(),
            });
        };

        let path = url.strip_prefix("ipfs://").unwrap_or(url);
        let mut fetch_url = format!("{}/ipfs/{}", lassie_url.trim_end_matches('/'), path);
        if !self.config.full_verification {
            fetch_url.push_str("&dag-scope=block");
        }
        Ok(fetch_url)
    }

    /// Send a HEAD request to the provider and record `head_status_code`
    pub async fn test_head_request(&self, address: &str, cid: &str, stats: &mut Stats) {
        let url = match retrieval_url(Protocol::Http, address, cid) {
            Ok(url) => url,
            Err(err) => {
                warn!(address, cid, error = %err, "Cannot build HEAD request URL");
                stats.head_status_code = Some(err.status_code());
                return;
            }
        };
        debug!(%url, "Testing HEAD request");

        let response = self
            .http
            .head(&url)
            .header(ACCEPT, RAW_CONTENT_TYPE)
            .timeout(self.config.head_timeout())
            .send()
            .await;

        stats.head_status_code = Some(match response {
            Ok(response) => response.status().as_u16(),
            Err(err) => {
                let err = transport_error(err);
                warn!(address, cid, error = %err, "Failed to make HEAD request");
                err.status_code()
            }
        });
    }
}
