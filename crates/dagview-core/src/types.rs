//! Shared types for the block view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExplorerError;

// ─── BlockType ────────────────────────────────────────────────────────────────

/// Role of a block in the DAG once ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// Canonical chain member at its height.
    Sync,
    /// Included but not canonical.
    Side,
    /// Discarded by consensus.
    Orphan,
    /// Ordered and included, neither sync nor side.
    Normal,
    /// Not classifiable yet. Never sent by the node.
    Unclassified,
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "Sync"),
            Self::Side => write!(f, "Side"),
            Self::Orphan => write!(f, "Orphan"),
            Self::Normal => write!(f, "Normal"),
            Self::Unclassified => write!(f, "Unclassified"),
        }
    }
}

// ─── Block ────────────────────────────────────────────────────────────────────

/// Where a block record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockOrigin {
    /// Returned by a range fetch; carries the node's own classification.
    #[default]
    Fetched,
    /// Delivered by a `NewBlock` event.
    Live,
}

/// A block as seen by the explorer.
///
/// Identity fields never change after creation; only `topoheight` and
/// `block_type` are updated in place when the node orders the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block hash, 64 hex characters.
    pub hash: String,
    /// DAG height. Several blocks may share one.
    pub height: u64,
    /// Position in the node's total order, once assigned.
    #[serde(default)]
    pub topoheight: Option<u64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(rename = "total_size_in_bytes", default)]
    pub size_bytes: u64,
    #[serde(rename = "txs_hashes", default)]
    pub tx_hashes: Vec<String>,
    #[serde(default)]
    pub total_fees: u64,
    #[serde(default)]
    pub reward: u64,
    pub miner: String,
    /// Classification as last reported by the node.
    #[serde(default)]
    pub block_type: Option<BlockType>,
    #[serde(skip)]
    pub origin: BlockOrigin,
}

impl Block {
    /// Decode and validate a block payload (range result or `NewBlock` event).
    pub fn from_payload(payload: Value) -> Result<Self, ExplorerError> {
        let block: Block = serde_json::from_value(payload)
            .map_err(|e| ExplorerError::validation(format!("block: {e}")))?;
        block.validate()?;
        Ok(block)
    }

    /// Check the invariants a payload must satisfy before it enters the window.
    pub fn validate(&self) -> Result<(), ExplorerError> {
        if !is_hash(&self.hash) {
            return Err(ExplorerError::validation(format!(
                "block hash `{}` is not 64 hex characters",
                self.hash
            )));
        }
        Ok(())
    }

    /// Block time as a UTC timestamp.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Number of transactions included.
    pub fn tx_count(&self) -> usize {
        self.tx_hashes.len()
    }

    /// Returns `true` once the node assigned a topoheight.
    pub fn is_ordered(&self) -> bool {
        self.topoheight.is_some()
    }
}

/// Returns `true` if `s` looks like a block or transaction hash.
pub fn is_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

// ─── BlockOrdered ─────────────────────────────────────────────────────────────

/// Payload of a `BlockOrdered` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOrdered {
    #[serde(alias = "hash")]
    pub block_hash: String,
    pub topoheight: u64,
    pub block_type: BlockType,
}

impl BlockOrdered {
    /// Decode and validate a `BlockOrdered` payload.
    pub fn from_payload(payload: Value) -> Result<Self, ExplorerError> {
        let ordered: BlockOrdered = serde_json::from_value(payload)
            .map_err(|e| ExplorerError::validation(format!("block ordered: {e}")))?;
        if !is_hash(&ordered.block_hash) {
            return Err(ExplorerError::validation(format!(
                "ordered block hash `{}` is not 64 hex characters",
                ordered.block_hash
            )));
        }
        Ok(ordered)
    }
}

// ─── NodeInfo ─────────────────────────────────────────────────────────────────

/// Subset of `get_info` used by the explorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub height: u64,
    pub topoheight: u64,
    /// Heights at or below this are final.
    pub stableheight: u64,
    #[serde(default)]
    pub mempool_size: u64,
    #[serde(default)]
    pub native_supply: u64,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

// ─── Test helpers ─────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use dagview_rpc::MemoryTransport;

    use super::*;

    /// Transport answering range queries for a linear chain of `tip + 1`
    /// blocks, where block `i` has id, height and topoheight `i`.
    pub fn chain_transport(tip: u64) -> Arc<MemoryTransport> {
        let t = Arc::new(MemoryTransport::new());
        t.respond("get_topoheight", Value::from(tip));
        t.respond_with("get_blocks_range_by_topoheight", |params| {
            let start = params["start_topoheight"].as_u64().unwrap_or(0);
            let end = params["end_topoheight"].as_u64().unwrap_or(0);
            Ok(Value::Array((start..=end).map(|i| payload(&ordered(i, i, i))).collect()))
        });
        t
    }

    /// Deterministic 64-hex hash for a small id.
    pub fn hash(id: u64) -> String {
        format!("{id:064x}")
    }

    /// An unordered block with the given id and height.
    pub fn block(id: u64, height: u64) -> Block {
        Block {
            hash: hash(id),
            height,
            topoheight: None,
            timestamp: 1_700_000_000_000 + id * 15_000,
            size_bytes: 120,
            tx_hashes: vec![],
            total_fees: 0,
            reward: 1_000,
            miner: "xel:miner".into(),
            block_type: None,
            origin: BlockOrigin::Fetched,
        }
    }

    /// An ordered block.
    pub fn ordered(id: u64, height: u64, topoheight: u64) -> Block {
        Block {
            topoheight: Some(topoheight),
            ..block(id, height)
        }
    }

    /// A block as delivered by a `NewBlock` event.
    pub fn live(id: u64, height: u64) -> Block {
        Block {
            origin: BlockOrigin::Live,
            ..block(id, height)
        }
    }

    /// JSON payload for `b`, as the node would send it.
    pub fn payload(b: &Block) -> Value {
        serde_json::to_value(b).unwrap()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
