//! CometBFT JSON-RPC response shapes.
//!
//! The node encodes 64-bit integers as JSON strings; the helpers here accept
//! either strings or numbers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use chaincollect_core::{Block, BlockHeader, NodeStatus, RpcError, TxResult, TxSearchPage};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl From<ErrorObject> for RpcError {
    fn from(e: ErrorObject) -> Self {
        let message = match e.data {
            Some(Value::String(data)) if !data.is_empty() => format!("{}: {data}", e.message),
            _ => e.message,
        };
        RpcError::Node {
            code: e.code,
            message,
        }
    }
}

/// Decode a JSON-RPC response body.
///
/// A JSON-RPC error object wins over the HTTP status, since nodes report
/// some request errors with a 500.
pub(crate) fn decode_response<T: DeserializeOwned>(
    http_ok: bool,
    http_status: u16,
    body: &str,
) -> Result<T, RpcError> {
    let envelope = match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => envelope,
        Err(_) if !http_ok => {
            return Err(RpcError::Transport(format!("HTTP {http_status}: {body}")));
        }
        Err(e) => return Err(RpcError::Decode(e.to_string())),
    };

    match (envelope.result, envelope.error) {
        (_, Some(err)) => Err(err.into()),
        (Some(_), None) if !http_ok => {
            Err(RpcError::Transport(format!("HTTP {http_status}: {body}")))
        }
        (Some(result), None) => Ok(result),
        (None, None) => Err(RpcError::Decode(
            "response has neither result nor error".into(),
        )),
    }
}

fn u64_str<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(u64),
        Str(String),
    }
    match Repr::deserialize(d)? {
        Repr::Num(n) => Ok(n),
        Repr::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn u32_str<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let n = u64_str(d)?;
    u32::try_from(n).map_err(serde::de::Error::custom)
}

// ─── status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResult {
    node_info: NodeInfo,
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    network: String,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    #[serde(deserialize_with = "u64_str")]
    latest_block_height: u64,
    latest_block_time: DateTime<Utc>,
}

impl From<StatusResult> for NodeStatus {
    fn from(r: StatusResult) -> Self {
        NodeStatus {
            network: r.node_info.network,
            latest_block_height: r.sync_info.latest_block_height,
            latest_block_time: r.sync_info.latest_block_time,
        }
    }
}

// ─── block ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct BlockResult {
    block: WireBlock,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    header: WireHeader,
    #[serde(default)]
    data: WireData,
}

#[derive(Debug, Deserialize)]
struct WireHeader {
    chain_id: String,
    #[serde(deserialize_with = "u64_str")]
    height: u64,
    time: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct WireData {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

impl From<BlockResult> for Block {
    fn from(r: BlockResult) -> Self {
        let header = r.block.header;
        Block {
            header: BlockHeader {
                chain_id: header.chain_id,
                height: header.height,
                time: header.time,
            },
            txs: r.block.data.txs.unwrap_or_default(),
        }
    }
}

// ─── tx_search ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct TxSearchResult {
    #[serde(default)]
    txs: Vec<WireTx>,
    #[serde(deserialize_with = "u64_str")]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct WireTx {
    hash: String,
    #[serde(deserialize_with = "u64_str")]
    height: u64,
    #[serde(deserialize_with = "u32_str")]
    index: u32,
    #[serde(default)]
    tx: String,
    #[serde(default)]
    tx_result: Value,
}

impl From<TxSearchResult> for TxSearchPage {
    fn from(r: TxSearchResult) -> Self {
        TxSearchPage {
            txs: r
                .txs
                .into_iter()
                .map(|t| {
                    Arc::new(TxResult {
                        hash: t.hash,
                        height: t.height,
                        index: t.index,
                        tx: t.tx,
                        result: t.tx_result,
                    })
                })
                .collect(),
            total_count: r.total_count,
        }
    }
}
