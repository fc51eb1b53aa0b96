//! Error types for the explorer core.

use dagview_rpc::TransportError;
use thiserror::Error;

/// Errors surfaced by the explorer core.
///
/// None of these is fatal to the reconciliation loop: stale and validation
/// errors are logged and dropped, transport errors are exposed to the
/// rendering side through the view snapshot.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("block {hash} is no longer held in the window")]
    StaleData { hash: String },

    #[error("invalid payload: {reason}")]
    Validation { reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ExplorerError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Returns `true` for a mutation that referenced an evicted block.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleData { .. })
    }

    /// Returns `true` for a malformed payload or an invalid cursor move.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if the node could not be reached or answered with an error.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
