//! Collector configuration and fluent builder.
//!
//! # Example
//!
//! ```rust,no_run
//! use chaincollect_core::{CollectorBuilder, MockRpc};
//!
//! let collector = CollectorBuilder::new()
//!     .per_page(50)
//!     .channel_capacity(16)
//!     .to_height(1_000)
//!     .build(MockRpc::new())
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};

use crate::collector::Collector;
use crate::error::CollectError;
use crate::rpc::CometRpc;

/// Page size used when none is configured. Matches the node's own default.
pub const DEFAULT_TXS_PER_PAGE: u32 = 30;

/// Largest page size a CometBFT node accepts.
pub const MAX_TXS_PER_PAGE: u32 = 100;

/// Configuration for a [`Collector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Transactions requested per `tx_search` page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Capacity of the channel created by `Collector::spawn_collect`.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Optional last height to collect. The effective end of the range is
    /// `min(to_height, latest)`.
    #[serde(default)]
    pub to_height: Option<u64>,
}

fn default_per_page() -> u32 { DEFAULT_TXS_PER_PAGE }
fn default_channel_capacity() -> usize { 32 }

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_TXS_PER_PAGE,
            channel_capacity: 32,
            to_height: None,
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<(), CollectError> {
        if self.per_page == 0 || self.per_page > MAX_TXS_PER_PAGE {
            return Err(CollectError::Config(format!(
                "per_page must be within 1..={MAX_TXS_PER_PAGE}, got {}",
                self.per_page
            )));
        }
        if self.channel_capacity == 0 {
            return Err(CollectError::Config("channel_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

/// Fluent builder for [`Collector`].
#[derive(Debug, Default)]
pub struct CollectorBuilder {
    config: CollectorConfig,
}

impl CollectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config (e.g. one read from a file).
    pub fn from_config(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// Set the `tx_search` page size.
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.config.per_page = per_page;
        self
    }

    /// Set the channel capacity used by `spawn_collect`.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Stop collecting after this height.
    pub fn to_height(mut self, height: u64) -> Self {
        self.config.to_height = Some(height);
        self
    }

    pub fn build_config(self) -> Result<CollectorConfig, CollectError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Validate the config and bind it to an RPC backend.
    pub fn build<C: CometRpc>(self, rpc: C) -> Result<Collector<C>, CollectError> {
        Ok(Collector::with_config(rpc, self.build_config()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = CollectorBuilder::new().build_config().unwrap();
        assert_eq!(cfg.per_page, 30);
        assert_eq!(cfg.channel_capacity, 32);
        assert_eq!(cfg.to_height, None);
    }

    #[test]
    fn builder_custom() {
        let cfg = CollectorBuilder::new()
            .per_page(100)
            .channel_capacity(1)
            .to_height(500)
            .build_config()
            .unwrap();
        assert_eq!(cfg.per_page, 100);
        assert_eq!(cfg.channel_capacity, 1);
        assert_eq!(cfg.to_height, Some(500));
    }

    #[test]
    fn rejects_out_of_range_page_size() {
        assert!(CollectorBuilder::new().per_page(0).build_config().is_err());
        assert!(CollectorBuilder::new().per_page(101).build_config().is_err());
        assert!(CollectorBuilder::new().channel_capacity(0).build_config().is_err());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: CollectorConfig = serde_json::from_str(r#"{"to_height": 9}"#).unwrap();
        assert_eq!(cfg.per_page, DEFAULT_TXS_PER_PAGE);
        assert_eq!(cfg.channel_capacity, 32);
        assert_eq!(cfg.to_height, Some(9));
    }
}
