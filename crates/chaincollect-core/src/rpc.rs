//! The `CometRpc` trait — the three node capabilities the collector uses.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RpcError;
use crate::query::TxQuery;
use crate::types::{Block, NodeStatus, OrderBy, TxSearchPage};

/// Read access to a CometBFT node.
///
/// Implementations must be `Send + Sync`; the collector adds no locking of its
/// own, so a backend shared between collectors must be safe for concurrent use.
#[async_trait]
pub trait CometRpc: Send + Sync {
    /// Node status, including the latest committed height.
    async fn status(&self) -> Result<NodeStatus, RpcError>;

    /// The block committed at `height`.
    async fn block(&self, height: u64) -> Result<Block, RpcError>;

    /// One page of transactions matching `query`.
    ///
    /// `page` is 1-based.
    async fn tx_search(
        &self,
        query: &TxQuery,
        prove: bool,
        page: u32,
        per_page: u32,
        order: OrderBy,
    ) -> Result<TxSearchPage, RpcError>;
}

#[async_trait]
impl<T: CometRpc + ?Sized> CometRpc for Arc<T> {
    async fn status(&self) -> Result<NodeStatus, RpcError> {
        (**self).status().await
    }

    async fn block(&self, height: u64) -> Result<Block, RpcError> {
        (**self).block(height).await
    }

    async fn tx_search(
        &self,
        query: &TxQuery,
        prove: bool,
        page: u32,
        per_page: u32,
        order: OrderBy,
    ) -> Result<TxSearchPage, RpcError> {
        (**self).tx_search(query, prove, page, per_page, order).await
    }
}

#[async_trait]
impl<'a, T: CometRpc + ?Sized> CometRpc for &'a T {
    async fn status(&self) -> Result<NodeStatus, RpcError> {
        (**self).status().await
    }

    async fn block(&self, height: u64) -> Result<Block, RpcError> {
        (**self).block(height).await
    }

    async fn tx_search(
        &self,
        query: &TxQuery,
        prove: bool,
        page: u32,
        per_page: u32,
        order: OrderBy,
    ) -> Result<TxSearchPage, RpcError> {
        (**self).tx_search(query, prove, page, per_page, order).await
    }
}
