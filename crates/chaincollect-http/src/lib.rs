//! chaincollect-http — CometBFT JSON-RPC over HTTP.
//!
//! [`HttpCometClient`] implements [`CometRpc`](chaincollect_core::CometRpc)
//! against a node's `status`, `block` and `tx_search` endpoints.

pub mod client;
mod wire;

pub use client::{HttpClientConfig, HttpCometClient};
