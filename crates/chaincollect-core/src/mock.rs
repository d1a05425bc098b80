//! In-memory RPC backend.
//!
//! Serves a scripted chain from memory and records every call. Failures and
//! inconsistent search totals can be injected per height or page. Used by the
//! test suites and for replaying captured blocks offline.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RpcError;
use crate::query::TxQuery;
use crate::rpc::CometRpc;
use crate::types::{Block, BlockHeader, NodeStatus, OrderBy, TxResult, TxSearchPage};

/// Arguments of one recorded `tx_search` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: TxQuery,
    pub prove: bool,
    pub page: u32,
    pub per_page: u32,
    pub order: OrderBy,
}

#[derive(Debug)]
struct MockBlock {
    header: BlockHeader,
    txs: Vec<Arc<TxResult>>,
}

#[derive(Debug, Default)]
struct MockState {
    latest_height: Option<u64>,
    blocks: BTreeMap<u64, MockBlock>,
    status_error: Option<String>,
    block_errors: HashMap<u64, String>,
    search_errors: HashMap<(u64, u32), String>,
    total_overrides: HashMap<u64, u64>,
    page_total_overrides: HashMap<(u64, u32), u64>,
    searches: Vec<SearchCall>,
}

#[derive(Debug)]
pub struct MockRpc {
    network: String,
    state: Mutex<MockState>,
    status_calls: AtomicUsize,
    block_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl Default for MockRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRpc {
    pub fn new() -> Self {
        Self::with_network("mock-1")
    }

    pub fn with_network(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            state: Mutex::new(MockState::default()),
            status_calls: AtomicUsize::new(0),
            block_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a block at `height` holding `tx_count` generated transactions.
    ///
    /// Returns the stored results so callers can check identity.
    pub fn push_block(&self, height: u64, tx_count: u32) -> Vec<Arc<TxResult>> {
        let txs: Vec<Arc<TxResult>> = (0..tx_count)
            .map(|index| {
                Arc::new(TxResult {
                    hash: format!("{height:016X}{index:08X}"),
                    height,
                    index,
                    tx: String::new(),
                    result: serde_json::json!({ "code": 0 }),
                })
            })
            .collect();
        let header = BlockHeader {
            chain_id: self.network.clone(),
            height,
            time: synthetic_time(height),
        };
        self.insert_block(header, txs.clone());
        txs
    }

    /// Add a block with caller-provided header and transactions.
    pub fn insert_block(&self, header: BlockHeader, txs: Vec<Arc<TxResult>>) {
        self.state()
            .blocks
            .insert(header.height, MockBlock { header, txs });
    }

    pub fn block_time(&self, height: u64) -> Option<DateTime<Utc>> {
        self.state().blocks.get(&height).map(|b| b.header.time)
    }

    /// Report `height` as the latest height instead of the highest stored block.
    pub fn set_latest_height(&self, height: u64) {
        self.state().latest_height = Some(height);
    }

    pub fn fail_status(&self, message: impl Into<String>) {
        self.state().status_error = Some(message.into());
    }

    pub fn fail_block(&self, height: u64, message: impl Into<String>) {
        self.state().block_errors.insert(height, message.into());
    }

    pub fn fail_search(&self, height: u64, page: u32, message: impl Into<String>) {
        self.state().search_errors.insert((height, page), message.into());
    }

    /// Report `total` as the match count for every search at `height`.
    pub fn fake_total_count(&self, height: u64, total: u64) {
        self.state().total_overrides.insert(height, total);
    }

    /// Report `total` as the match count for one page at `height` only.
    pub fn fake_page_total(&self, height: u64, page: u32, total: u64) {
        self.state().page_total_overrides.insert((height, page), total);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Every `tx_search` call received so far, oldest first.
    pub fn searches(&self) -> Vec<SearchCall> {
        self.state().searches.clone()
    }

    fn latest(&self, state: &MockState) -> u64 {
        state
            .latest_height
            .or_else(|| state.blocks.keys().next_back().copied())
            .unwrap_or(0)
    }
}

fn synthetic_time(height: u64) -> DateTime<Utc> {
    let height = i64::try_from(height).unwrap_or(i64::MAX);
    let secs = 1_700_000_000_i64.saturating_add(height.saturating_mul(6));
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl CometRpc for MockRpc {
    async fn status(&self) -> Result<NodeStatus, RpcError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if let Some(msg) = &state.status_error {
            return Err(RpcError::Other(msg.clone()));
        }
        let latest = self.latest(&state);
        Ok(NodeStatus {
            network: self.network.clone(),
            latest_block_height: latest,
            latest_block_time: state
                .blocks
                .get(&latest)
                .map_or_else(|| synthetic_time(latest), |b| b.header.time),
        })
    }

    async fn block(&self, height: u64) -> Result<Block, RpcError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if let Some(msg) = state.block_errors.get(&height) {
            return Err(RpcError::Other(msg.clone()));
        }
        match state.blocks.get(&height) {
            Some(b) => Ok(Block {
                header: b.header.clone(),
                txs: b.txs.iter().map(|t| t.tx.clone()).collect(),
            }),
            None => Err(RpcError::Node {
                code: -32603,
                message: format!(
                    "height {height} must be less than or equal to the current blockchain height {}",
                    self.latest(&state)
                ),
            }),
        }
    }

    async fn tx_search(
        &self,
        query: &TxQuery,
        prove: bool,
        page: u32,
        per_page: u32,
        order: OrderBy,
    ) -> Result<TxSearchPage, RpcError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.searches.push(SearchCall {
            query: query.clone(),
            prove,
            page,
            per_page,
            order,
        });

        let height = query.target_height();
        if let Some(msg) = state.search_errors.get(&(height, page)) {
            return Err(RpcError::Other(msg.clone()));
        }

        let mut all: Vec<Arc<TxResult>> = state
            .blocks
            .get(&height)
            .map(|b| b.txs.clone())
            .unwrap_or_default();
        if order == OrderBy::Desc {
            all.reverse();
        }

        let per_page = per_page.max(1) as usize;
        let skip = (page.max(1) as usize - 1).saturating_mul(per_page);
        let txs = all.iter().skip(skip).take(per_page).cloned().collect();
        let total_count = state
            .page_total_overrides
            .get(&(height, page))
            .or_else(|| state.total_overrides.get(&height))
            .copied()
            .unwrap_or(all.len() as u64);

        Ok(TxSearchPage { txs, total_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_height_defaults_to_highest_block() {
        let rpc = MockRpc::new();
        rpc.push_block(3, 0);
        rpc.push_block(7, 0);
        assert_eq!(rpc.status().await.unwrap().latest_block_height, 7);

        rpc.set_latest_height(10);
        assert_eq!(rpc.status().await.unwrap().latest_block_height, 10);
        assert_eq!(rpc.status_calls(), 2);
    }

    #[test]
    fn block_times_grow_with_height() {
        assert!(synthetic_time(2) > synthetic_time(1));
        assert!(synthetic_time(u64::MAX) >= synthetic_time(1));
        assert!(synthetic_time(i64::MAX as u64 + 1) >= synthetic_time(1));
    }

    #[tokio::test]
    async fn page_total_override_applies_to_one_page() {
        let rpc = MockRpc::new();
        rpc.push_block(2, 4);
        rpc.fake_page_total(2, 1, 9);
        let q = TxQuery::height(2);

        let p1 = rpc.tx_search(&q, false, 1, 2, OrderBy::Asc).await.unwrap();
        let p2 = rpc.tx_search(&q, false, 2, 2, OrderBy::Asc).await.unwrap();
        assert_eq!(p1.total_count, 9);
        assert_eq!(p2.total_count, 4);
    }

    #[tokio::test]
    async fn search_pages_through_block() {
        let rpc = MockRpc::new();
        let raws = rpc.push_block(5, 5);
        let q = TxQuery::height(5);

        let p2 = rpc.tx_search(&q, false, 2, 2, OrderBy::Asc).await.unwrap();
        assert_eq!(p2.total_count, 5);
        assert_eq!(p2.txs.len(), 2);
        assert!(Arc::ptr_eq(&p2.txs[0], &raws[2]));

        let p3 = rpc.tx_search(&q, false, 3, 2, OrderBy::Asc).await.unwrap();
        assert_eq!(p3.txs.len(), 1);
        assert!(Arc::ptr_eq(&p3.txs[0], &raws[4]));
    }
}
