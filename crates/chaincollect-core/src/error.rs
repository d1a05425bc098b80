//! Error types for the collection pipeline.

use thiserror::Error;

/// Errors reported by an RPC backend.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

/// Errors that end a collection call.
///
/// Every RPC failure is wrapped with the stage that produced it. Cancellation
/// has its own variants so callers can tell it apart from node failures.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("status request failed: {0}")]
    Status(#[source] RpcError),

    #[error("block request for height {height} failed: {source}")]
    Block {
        height: u64,
        #[source]
        source: RpcError,
    },

    #[error("tx search for height {height} (page {page}) failed: {source}")]
    Search {
        height: u64,
        page: u32,
        #[source]
        source: RpcError,
    },

    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid start height {0}: block heights start at 1")]
    InvalidStartHeight(u64),

    #[error("transaction receiver dropped while sending height {height}")]
    ReceiverDropped { height: u64 },

    #[error("invalid collector config: {0}")]
    Config(String),

    #[error("collector task failed: {0}")]
    TaskFailed(String),
}

impl CollectError {
    /// Returns `true` if the caller cancelled or the deadline expired.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }

    /// The underlying RPC error, if this failure came from the node.
    pub fn rpc_source(&self) -> Option<&RpcError> {
        match self {
            Self::Status(e) => Some(e),
            Self::Block { source, .. } | Self::Search { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_distinct_from_rpc_failures() {
        assert!(CollectError::Canceled.is_cancellation());
        assert!(CollectError::DeadlineExceeded.is_cancellation());

        let err = CollectError::Status(RpcError::Transport("connection refused".into()));
        assert!(!err.is_cancellation());
        assert!(matches!(err.rpc_source(), Some(RpcError::Transport(_))));
    }

    #[test]
    fn stage_is_part_of_the_message() {
        let err = CollectError::Search {
            height: 7,
            page: 2,
            source: RpcError::Node {
                code: -32603,
                message: "internal error".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("height 7"));
        assert!(msg.contains("page 2"));
        assert!(msg.contains("-32603"));
    }
}
