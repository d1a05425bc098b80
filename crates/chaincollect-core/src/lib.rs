//! chaincollect-core — ordered, paginated transaction collection over a
//! CometBFT node's RPC interface.
//!
//! # Architecture
//!
//! ```text
//! Collector::collect_txs(ctx, start, sender)
//!     ├── CometRpc::status          (latest height, read once per call)
//!     └── for height in start..=latest
//!           └── Collector::fetch_block_txs
//!                 ├── CometRpc::block      (header time)
//!                 └── CometRpc::tx_search  (page 1..N, ascending)
//! ```
//!
//! Each height produces at most one `Vec<Tx>` on the output channel. The
//! sender is owned by the collector and dropped on every return path, so the
//! consumer always observes a closed channel once collection ends.

pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod fetcher;
pub mod mock;
pub mod query;
pub mod rpc;
pub mod types;

pub use collector::{Collector, TxBatches};
pub use config::{CollectorBuilder, CollectorConfig, DEFAULT_TXS_PER_PAGE};
pub use context::{CancelHandle, Context};
pub use error::{CollectError, RpcError};
pub use mock::MockRpc;
pub use query::TxQuery;
pub use rpc::CometRpc;
pub use types::{Block, BlockHeader, NodeStatus, OrderBy, Tx, TxResult, TxSearchPage};
