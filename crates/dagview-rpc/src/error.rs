//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to a node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The connection to the node is not open.
    #[error("not connected to node")]
    NotConnected,

    /// The transport was shut down while the request was in flight.
    #[error("transport closed")]
    Closed,

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and a later attempt may succeed.
    ///
    /// Nothing in this workspace retries on its own; the flag is for callers
    /// that own a retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::NotConnected | Self::Timeout { .. }
        )
    }

    /// Returns `true` if this is a node-side error (not retryable).
    pub fn is_node_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}
