//! Chain JSON-RPC client
//!
//! Only the two methods needed for peer-id resolution are wrapped:
//! `Filecoin.ChainHead` and `Filecoin.StateMinerInfo`.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use spark_error::{error_chain_message, RpcError, RpcResult};
use tracing::debug;

use crate::config::RpcConfig;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TipSet {
    #[serde(rename = "Cids")]
    cids: Value,
}

/// The part of `StateMinerInfo` we care about
#[derive(Debug, Clone, Deserialize)]
pub struct MinerInfo {
    #[serde(rename = "PeerId", default)]
    pub peer_id: Option<String>,
}

/// JSON-RPC 2.0 client for a Lotus-compatible endpoint
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(http: reqwest::Client, config: &RpcConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            auth_token: config.auth_token.clone(),
            timeout: config.request_timeout(),
        }
    }

    /// Call `method` and decode its `result`
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> RpcResult<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        debug!(method, url = %self.url, "Calling JSON RPC");

        let mut request = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RpcError::Transport(error_chain_message(&err)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RpcError::Http {
                status: status.as_u16(),
                body: text.trim_end().to_string(),
            });
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| RpcError::InvalidResponse(error_chain_message(&err)))?;

        if let Some(error) = body.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = body
            .result
            .ok_or_else(|| RpcError::InvalidResponse("missing result".to_string()))?;
        serde_json::from_value(result).map_err(|err| RpcError::InvalidResponse(err.to_string()))
    }

    /// Tipset key of the current chain head
    pub async fn chain_head(&self) -> RpcResult<Value> {
        let tipset: TipSet = self.call("Filecoin.ChainHead", json!([])).await?;
        Ok(tipset.cids)
    }

    pub async fn state_miner_info(&self, miner_id: &str, tipset_key: &Value) -> RpcResult<MinerInfo> {
        self.call("Filecoin.StateMinerInfo", json!([miner_id, tipset_key]))
            .await
    }
}
