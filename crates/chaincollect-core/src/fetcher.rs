//! Block transaction fetcher.
//!
//! Resolves a single height into its complete, ordered transaction list by
//! walking `tx_search` pages until the count reported by the first page is
//! covered.

use tracing::debug;

use crate::config::MAX_TXS_PER_PAGE;
use crate::context::Context;
use crate::error::CollectError;
use crate::query::TxQuery;
use crate::rpc::CometRpc;
use crate::types::{OrderBy, Tx};

/// Wraps a `CometRpc` backend and adds pagination.
pub struct TxFetcher<C> {
    client: C,
    per_page: u32,
}

impl<C: CometRpc> TxFetcher<C> {
    /// `per_page` is clamped to `1..=MAX_TXS_PER_PAGE`; a zero page size
    /// would never cover a non-empty block.
    pub fn new(client: C, per_page: u32) -> Self {
        Self {
            client,
            per_page: per_page.clamp(1, MAX_TXS_PER_PAGE),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Fetch the latest committed height.
    pub async fn latest_height(&self, ctx: &Context) -> Result<u64, CollectError> {
        let status = ctx
            .run(async { self.client.status().await.map_err(CollectError::Status) })
            .await?;
        Ok(status.latest_block_height)
    }

    /// Fetch every transaction committed at `height`, in block order.
    ///
    /// Either the full list is returned or an error; pages fetched before a
    /// failing page are discarded.
    pub async fn block_txs(&self, ctx: &Context, height: u64) -> Result<Vec<Tx>, CollectError> {
        let block = ctx
            .run(async {
                self.client
                    .block(height)
                    .await
                    .map_err(|source| CollectError::Block { height, source })
            })
            .await?;
        let block_time = block.header.time;

        let query = TxQuery::height(height);
        let mut txs = Vec::new();
        let mut page: u32 = 1;
        // Later pages may report a different total; only the first one counts.
        let mut total_count = None;

        loop {
            let res = ctx
                .run(async {
                    self.client
                        .tx_search(&query, false, page, self.per_page, OrderBy::Asc)
                        .await
                        .map_err(|source| CollectError::Search { height, page, source })
                })
                .await?;

            let total = *total_count.get_or_insert(res.total_count);
            debug!(height, page, returned = res.txs.len(), total, "tx page fetched");

            txs.extend(res.txs.into_iter().map(|raw| Tx { block_time, raw }));

            if u64::from(page) * u64::from(self.per_page) >= total {
                break;
            }
            page += 1;
        }

        Ok(txs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use crate::mock::MockRpc;
    use std::sync::Arc;

    #[tokio::test]
    async fn single_page() {
        let rpc = MockRpc::new();
        let raws = rpc.push_block(1, 1);
        let fetcher = TxFetcher::new(&rpc, 30);

        let txs = fetcher.block_txs(&Context::background(), 1).await.unwrap();

        assert_eq!(txs.len(), 1);
        assert!(Arc::ptr_eq(&txs[0].raw, &raws[0]));
        assert_eq!(Some(txs[0].block_time), rpc.block_time(1));
        assert_eq!(rpc.block_calls(), 1);
        assert_eq!(rpc.search_calls(), 1);

        let call = &rpc.searches()[0];
        assert_eq!(call.query, TxQuery::height(1));
        assert_eq!((call.page, call.per_page), (1, 30));
        assert_eq!(call.order, OrderBy::Asc);
        assert!(!call.prove);
    }

    #[tokio::test]
    async fn follows_pages_until_total_is_covered() {
        let rpc = MockRpc::new();
        let raws = rpc.push_block(1, 31);
        let fetcher = TxFetcher::new(&rpc, 30);

        let txs = fetcher.block_txs(&Context::background(), 1).await.unwrap();

        assert_eq!(rpc.search_calls(), 2);
        let pages: Vec<u32> = rpc.searches().iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![1, 2]);
        assert_eq!(txs.len(), 31);
        for (tx, raw) in txs.iter().zip(&raws) {
            assert!(Arc::ptr_eq(&tx.raw, raw));
        }
        let block_time = rpc.block_time(1).unwrap();
        assert!(txs.iter().all(|tx| tx.block_time == block_time));
    }

    #[tokio::test]
    async fn stops_at_first_reported_total() {
        let rpc = MockRpc::new();
        rpc.push_block(1, 1);
        rpc.fake_total_count(1, 31);
        let fetcher = TxFetcher::new(&rpc, 30);

        let txs = fetcher.block_txs(&Context::background(), 1).await.unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(rpc.search_calls(), 2);
    }

    #[tokio::test]
    async fn later_larger_total_is_ignored() {
        let rpc = MockRpc::new();
        rpc.push_block(1, 61);
        rpc.fake_page_total(1, 1, 31);
        let fetcher = TxFetcher::new(&rpc, 30);

        let txs = fetcher.block_txs(&Context::background(), 1).await.unwrap();

        // ceil(31 / 30) pages, even though page 2 reports 61
        assert_eq!(rpc.search_calls(), 2);
        assert_eq!(txs.len(), 60);
    }

    #[tokio::test]
    async fn zero_page_size_is_clamped() {
        let rpc = MockRpc::new();
        rpc.push_block(1, 3);
        let fetcher = TxFetcher::new(&rpc, 0);
        assert_eq!(fetcher.per_page(), 1);

        let txs = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            fetcher.block_txs(&Context::background(), 1),
        )
        .await
        .expect("fetch should terminate")
        .unwrap();

        assert_eq!(txs.len(), 3);
        assert_eq!(rpc.search_calls(), 3);
        assert!(rpc.searches().iter().all(|c| c.per_page == 1));
    }

    #[test]
    fn oversized_page_size_is_clamped() {
        let rpc = MockRpc::new();
        assert_eq!(TxFetcher::new(&rpc, 500).per_page(), MAX_TXS_PER_PAGE);
    }

    #[tokio::test]
    async fn empty_block_still_searches_once() {
        let rpc = MockRpc::new();
        rpc.push_block(1, 0);
        let fetcher = TxFetcher::new(&rpc, 30);

        let txs = fetcher.block_txs(&Context::background(), 1).await.unwrap();

        assert!(txs.is_empty());
        assert_eq!(rpc.search_calls(), 1);
    }

    #[tokio::test]
    async fn block_error_skips_search() {
        let rpc = MockRpc::new();
        rpc.push_block(1, 3);
        rpc.fail_block(1, "expected error");
        let fetcher = TxFetcher::new(&rpc, 30);

        let err = fetcher.block_txs(&Context::background(), 1).await.unwrap_err();

        assert!(matches!(
            err,
            CollectError::Block { height: 1, source: RpcError::Other(ref m) } if m == "expected error"
        ));
        assert_eq!(rpc.block_calls(), 1);
        assert_eq!(rpc.search_calls(), 0);
    }

    #[tokio::test]
    async fn search_error_discards_earlier_pages() {
        let rpc = MockRpc::new();
        rpc.push_block(1, 31);
        rpc.fail_search(1, 2, "expected error");
        let fetcher = TxFetcher::new(&rpc, 30);

        let res = fetcher.block_txs(&Context::background(), 1).await;

        assert!(matches!(res, Err(CollectError::Search { height: 1, page: 2, .. })));
        assert_eq!(rpc.search_calls(), 2);
    }

    #[tokio::test]
    async fn missing_block_surfaces_backend_error() {
        let rpc = MockRpc::new();
        let fetcher = TxFetcher::new(&rpc, 30);

        let err = fetcher.block_txs(&Context::background(), 9).await.unwrap_err();

        assert!(matches!(err, CollectError::Block { height: 9, source: RpcError::Node { .. } }));
    }
}
