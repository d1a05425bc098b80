//! Typed `tx_search` queries.

use serde::{Deserialize, Serialize};

/// A transaction search condition.
///
/// Rendered into the node's query language through `Display`, e.g.
/// `TxQuery::height(5)` becomes `tx.height=5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxQuery {
    /// Every transaction committed at exactly this height.
    Height(u64),
}

impl TxQuery {
    pub fn height(height: u64) -> Self {
        Self::Height(height)
    }

    /// The height this query is pinned to.
    pub fn target_height(&self) -> u64 {
        match self {
            Self::Height(h) => *h,
        }
    }
}

impl std::fmt::Display for TxQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Height(h) => write!(f, "tx.height={h}"),
        }
    }
}
