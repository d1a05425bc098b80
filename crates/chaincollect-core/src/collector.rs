//! Range collector — streams one transaction batch per height.
//!
//! The collector reads the latest height once, then walks `[start, end]` in
//! ascending order. For each height it checks the context, fetches the block's
//! transactions and sends them as a single `Vec<Tx>`. Empty blocks send
//! nothing. The first failure ends the call.
//!
//! The output `Sender` is taken by value and dropped before `collect_txs`
//! returns, so the receiving side always sees the channel close, whatever the
//! outcome.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CollectorConfig;
use crate::context::Context;
use crate::error::CollectError;
use crate::fetcher::TxFetcher;
use crate::rpc::CometRpc;
use crate::types::Tx;

pub struct Collector<C> {
    fetcher: TxFetcher<C>,
    config: CollectorConfig,
}

impl<C: CometRpc> Collector<C> {
    /// A collector with the default configuration.
    pub fn new(rpc: C) -> Self {
        Self::with_config(rpc, CollectorConfig::default())
    }

    /// An out-of-range `per_page` is clamped; use
    /// [`CollectorBuilder`](crate::config::CollectorBuilder) to reject it instead.
    pub fn with_config(rpc: C, mut config: CollectorConfig) -> Self {
        let fetcher = TxFetcher::new(rpc, config.per_page);
        config.per_page = fetcher.per_page();
        Self { fetcher, config }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn rpc(&self) -> &C {
        self.fetcher.client()
    }

    /// The node's latest committed height.
    pub async fn latest_height(&self, ctx: &Context) -> Result<u64, CollectError> {
        self.fetcher.latest_height(ctx).await
    }

    /// All transactions of the block at `height`, in block order.
    pub async fn fetch_block_txs(&self, ctx: &Context, height: u64) -> Result<Vec<Tx>, CollectError> {
        self.fetcher.block_txs(ctx, height).await
    }

    /// Collect every transaction from `start` up to the latest height and send
    /// them, one batch per non-empty block, on `sender`.
    ///
    /// The channel is closed when this returns. On error the receiver may have
    /// seen fewer heights than requested, never a partial height.
    pub async fn collect_txs(
        &self,
        ctx: &Context,
        start: u64,
        sender: mpsc::Sender<Vec<Tx>>,
    ) -> Result<(), CollectError> {
        let result = self.collect_into(ctx, start, &sender).await;
        drop(sender);

        if let Err(e) = &result {
            warn!(start, error = %e, "transaction collection aborted");
        }
        result
    }

    async fn collect_into(
        &self,
        ctx: &Context,
        start: u64,
        sender: &mpsc::Sender<Vec<Tx>>,
    ) -> Result<(), CollectError> {
        if start == 0 {
            return Err(CollectError::InvalidStartHeight(start));
        }

        let latest = self.fetcher.latest_height(ctx).await?;
        let end = self.config.to_height.map_or(latest, |to| to.min(latest));
        if end < start {
            info!(start, end, "nothing to collect");
            return Ok(());
        }

        info!(start, end, latest, per_page = self.fetcher.per_page(), "collecting transactions");

        let mut batches = 0u64;
        let mut total = 0usize;
        for height in start..=end {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let txs = self.fetcher.block_txs(ctx, height).await?;
            if txs.is_empty() {
                debug!(height, "block has no transactions");
                continue;
            }

            let count = txs.len();
            ctx.run(async {
                sender
                    .send(txs)
                    .await
                    .map_err(|_| CollectError::ReceiverDropped { height })
            })
            .await?;

            batches += 1;
            total += count;
            debug!(height, txs = count, "batch sent");
        }

        info!(start, end, batches, txs = total, "collection complete");
        Ok(())
    }
}

impl<C: CometRpc + 'static> Collector<C> {
    /// Run `collect_txs` on its own task with a bounded channel of
    /// `channel_capacity` batches.
    pub fn spawn_collect(self: &Arc<Self>, ctx: Context, start: u64) -> TxBatches {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let collector = Arc::clone(self);
        let handle = tokio::spawn(async move { collector.collect_txs(&ctx, start, tx).await });
        TxBatches { receiver: rx, handle }
    }
}

/// Receiving side of a spawned collection.
pub struct TxBatches {
    receiver: mpsc::Receiver<Vec<Tx>>,
    handle: JoinHandle<Result<(), CollectError>>,
}

impl TxBatches {
    /// Next batch, or `None` once the collector has closed the channel.
    pub async fn recv(&mut self) -> Option<Vec<Tx>> {
        self.receiver.recv().await
    }

    /// Batches as a stream. Ends when the channel closes.
    pub fn stream(&mut self) -> impl Stream<Item = Vec<Tx>> + '_ {
        futures::stream::unfold(&mut self.receiver, |rx| async move {
            rx.recv().await.map(|batch| (batch, rx))
        })
    }

    /// Wait for the collector task and return its result.
    ///
    /// Undelivered batches are dropped; if the collector was still sending it
    /// ends with `ReceiverDropped`.
    pub async fn finish(self) -> Result<(), CollectError> {
        drop(self.receiver);
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(CollectError::TaskFailed(e.to_string())),
        }
    }
}
