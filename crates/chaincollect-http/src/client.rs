//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! One POST per call, no retries: a failed request is reported to the
//! collector, which abandons the range.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use chaincollect_core::{Block, CometRpc, NodeStatus, OrderBy, RpcError, TxQuery, TxSearchPage};

use crate::wire::{decode_response, BlockResult, StatusResult, TxSearchResult};

/// Configuration for `HttpCometClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// CometBFT RPC client over HTTP.
pub struct HttpCometClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpCometClient {
    /// Create a client for the node's RPC endpoint, e.g. `http://localhost:26657`.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, RpcError> {
        Self::new(url, HttpClientConfig::default())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::debug!(id, method, url = %self.url, "rpc request");

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        decode_response(status.is_success(), status.as_u16(), &text)
    }
}

#[async_trait]
impl CometRpc for HttpCometClient {
    async fn status(&self) -> Result<NodeStatus, RpcError> {
        let res: StatusResult = self.call("status", json!({})).await?;
        Ok(res.into())
    }

    async fn block(&self, height: u64) -> Result<Block, RpcError> {
        let res: BlockResult = self
            .call("block", json!({ "height": height.to_string() }))
            .await?;
        Ok(res.into())
    }

    async fn tx_search(
        &self,
        query: &TxQuery,
        prove: bool,
        page: u32,
        per_page: u32,
        order: OrderBy,
    ) -> Result<TxSearchPage, RpcError> {
        let params = json!({
            "query": query.to_string(),
            "prove": prove,
            "page": page.to_string(),
            "per_page": per_page.to_string(),
            "order_by": order.as_str(),
        });
        let res: TxSearchResult = self.call("tx_search", params).await?;
        Ok(res.into())
    }
}
