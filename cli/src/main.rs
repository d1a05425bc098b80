//! chaincollect CLI — stream historical transactions from a CometBFT node.
//!
//! Usage:
//! ```bash
//! # Latest height of a node
//! chaincollect status --node http://localhost:26657
//!
//! # Every transaction from height 100 to the current head, as JSON lines
//! chaincollect collect --node http://localhost:26657 --from 100
//!
//! # Same, with debug logs from the collector only
//! chaincollect collect --node http://localhost:26657 --from 100 \
//!     --log warn --log-component chaincollect-core=debug
//! ```

mod logging;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::json;

use chaincollect_core::{CollectorBuilder, CollectorConfig, CometRpc, Context, Tx};
use chaincollect_http::{HttpClientConfig, HttpCometClient};

use crate::logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "chaincollect",
    about = "Stream historical transactions from a CometBFT node",
    version
)]
struct Cli {
    /// Log level or filter directives (logs are written to stderr)
    #[arg(long, global = true, env = "CHAINCOLLECT_LOG", default_value = "info")]
    log: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Per-component level override, e.g. `chaincollect-core=debug` (repeatable)
    #[arg(long = "log-component", global = true, value_parser = logging::parse_component)]
    log_components: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node's chain ID and latest height
    Status {
        #[command(flatten)]
        node: NodeArgs,
    },

    /// Print every transaction in a height range, one JSON object per line
    Collect {
        #[command(flatten)]
        node: NodeArgs,
        /// First height to collect (>= 1)
        #[arg(long)]
        from: u64,
        /// Last height to collect (default: the node's latest height)
        #[arg(long)]
        to: Option<u64>,
        /// Transactions per tx_search page
        #[arg(long)]
        per_page: Option<u32>,
        /// Collector config file (JSON); flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(clap::Args)]
struct NodeArgs {
    /// CometBFT RPC endpoint
    #[arg(long, env = "CHAINCOLLECT_NODE", default_value = "http://localhost:26657")]
    node: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,
}

impl NodeArgs {
    fn client(&self) -> Result<HttpCometClient> {
        let config = HttpClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout),
        };
        HttpCometClient::new(&self.node, config)
            .with_context(|| format!("failed to create RPC client for {}", self.node))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&LogConfig {
        level: cli.log.clone(),
        components: cli.log_components.iter().cloned().collect(),
        json: cli.log_json,
    });

    match cli.command {
        Commands::Status { node } => cmd_status(node).await,
        Commands::Collect {
            node,
            from,
            to,
            per_page,
            config,
            timeout,
        } => {
            let mut collector_config = match config {
                Some(path) => read_config(&path)?,
                None => CollectorConfig::default(),
            };
            if let Some(to) = to {
                collector_config.to_height = Some(to);
            }
            if let Some(per_page) = per_page {
                collector_config.per_page = per_page;
            }
            cmd_collect(node, from, collector_config, timeout).await
        }
    }
}

fn read_config(path: &Path) -> Result<CollectorConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid collector config in {}", path.display()))
}

async fn cmd_status(node: NodeArgs) -> Result<()> {
    let client = node.client()?;
    let status = client
        .status()
        .await
        .with_context(|| format!("status request to {} failed", node.node))?;

    let line = json!({
        "network": status.network,
        "latest_block_height": status.latest_block_height,
        "latest_block_time": status.latest_block_time,
    });
    write_line(&mut io::stdout().lock(), &line).context("failed to write to stdout")?;
    Ok(())
}

async fn cmd_collect(
    node: NodeArgs,
    from: u64,
    config: CollectorConfig,
    timeout: Option<u64>,
) -> Result<()> {
    let collector = Arc::new(
        CollectorBuilder::from_config(config)
            .build(node.client()?)
            .context("invalid collector configuration")?,
    );

    let (ctx, cancel) = Context::with_cancel();
    let ctx = match timeout {
        Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
        None => ctx,
    };

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping collection");
                cancel.cancel();
            }
        }
    });

    let mut batches = collector.spawn_collect(ctx, from);
    let mut count = 0u64;
    let mut reader_gone = false;
    {
        let mut out = io::stdout().lock();
        let mut stream = std::pin::pin!(batches.stream());
        'batches: while let Some(batch) = stream.next().await {
            for tx in &batch {
                if !write_line(&mut out, &tx_line(tx)).context("failed to write to stdout")? {
                    reader_gone = true;
                    break 'batches;
                }
                count += 1;
            }
        }
        if !reader_gone {
            reader_gone = flush(&mut out).context("failed to flush stdout")?;
        }
    }

    if reader_gone {
        // Downstream closed the pipe (e.g. `| head`): stop quietly.
        cancel.cancel();
        let _ = batches.finish().await;
        tracing::info!(count, "output closed, collection stopped");
        return Ok(());
    }

    batches
        .finish()
        .await
        .with_context(|| format!("collection from height {from} failed after {count} transactions"))?;

    tracing::info!(count, "done");
    Ok(())
}

/// Write one JSON line. `Ok(false)` means the reader closed the pipe.
fn write_line(out: &mut impl Write, value: &serde_json::Value) -> io::Result<bool> {
    match writeln!(out, "{value}") {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(e) => Err(e),
    }
}

/// `Ok(true)` if the reader closed the pipe before the flush.
fn flush(out: &mut impl Write) -> io::Result<bool> {
    match out.flush() {
        Ok(()) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(true),
        Err(e) => Err(e),
    }
}

fn tx_line(tx: &Tx) -> serde_json::Value {
    json!({
        "height": tx.raw.height,
        "index": tx.raw.index,
        "hash": tx.raw.hash,
        "block_time": tx.block_time,
        "tx": tx.raw.tx,
        "result": tx.raw.result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_json_object_per_line() {
        let mut out = Vec::new();
        assert!(write_line(&mut out, &json!({ "height": 1 })).unwrap());
        assert!(write_line(&mut out, &json!({ "height": 2 })).unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), "{\"height\":1}\n{\"height\":2}\n");
    }

    #[test]
    fn closed_pipe_is_a_clean_stop() {
        assert!(!write_line(&mut ClosedPipe, &json!({ "height": 1 })).unwrap());
        assert!(flush(&mut ClosedPipe).unwrap());
    }

    #[test]
    fn other_write_errors_propagate() {
        let err = write_line(&mut FullDisk, &json!({ "height": 1 })).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
