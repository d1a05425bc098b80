//! Shared types for the collection pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Node / block ─────────────────────────────────────────────────────────────

/// The subset of a node's `status` response the collector needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Chain ID reported by the node (e.g. `"cosmoshub-4"`).
    pub network: String,
    /// Height of the most recent committed block.
    pub latest_block_height: u64,
    /// Time of the most recent committed block.
    pub latest_block_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: u64,
    pub time: DateTime<Utc>,
}

/// A block as returned by the node. The body is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// Base64 encoded transactions, as returned by the node.
    #[serde(default)]
    pub txs: Vec<String>,
}

// ─── Transaction search ───────────────────────────────────────────────────────

/// A single `tx_search` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxResult {
    /// Transaction hash (upper-case hex).
    pub hash: String,
    pub height: u64,
    /// Position of the transaction inside its block.
    pub index: u32,
    /// Base64 encoded transaction bytes.
    pub tx: String,
    /// Execution result (`tx_result`), left undecoded.
    #[serde(default)]
    pub result: serde_json::Value,
}

/// One page of a `tx_search` response.
#[derive(Debug, Clone, Default)]
pub struct TxSearchPage {
    pub txs: Vec<Arc<TxResult>>,
    /// Total number of matches across all pages.
    pub total_count: u64,
}

/// Result ordering for `tx_search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    Asc,
    Desc,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl std::fmt::Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Tx ───────────────────────────────────────────────────────────────────────

/// A collected transaction.
///
/// `raw` points at the search result returned by the RPC backend; the
/// collector never copies or mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tx {
    /// Header time of the containing block. Identical for every tx of a block.
    pub block_time: DateTime<Utc>,
    pub raw: Arc<TxResult>,
}

impl Tx {
    pub fn height(&self) -> u64 {
        self.raw.height
    }

    pub fn hash(&self) -> &str {
        &self.raw.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_by_wire_names() {
        assert_eq!(OrderBy::Asc.to_string(), "asc");
        assert_eq!(OrderBy::Desc.as_str(), "desc");
        assert_eq!(serde_json::to_string(&OrderBy::Asc).unwrap(), "\"asc\"");
    }

    #[test]
    fn tx_shares_the_search_result() {
        let raw = Arc::new(TxResult {
            hash: "AB12".into(),
            height: 10,
            index: 0,
            tx: "CgQ=".into(),
            result: serde_json::Value::Null,
        });
        let tx = Tx {
            block_time: Utc::now(),
            raw: Arc::clone(&raw),
        };
        assert!(Arc::ptr_eq(&tx.raw, &raw));
        assert_eq!(tx.height(), 10);
        assert_eq!(tx.hash(), "AB12");
    }
}
