//! Typed node calls on top of a [`NodeTransport`], each bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use dagview_rpc::{NodeTransport, TransportError};

use crate::account::{AccountBalance, AccountNonce, AssetData};
use crate::cursor::page_range;
use crate::error::ExplorerError;
use crate::history::{HistoryEntry, HistoryRequest};
use crate::types::{Block, NodeInfo};

/// One page of blocks, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPage {
    /// Node topoheight at fetch time.
    pub topoheight: u64,
    pub blocks: Vec<Block>,
}

/// Node daemon API.
#[derive(Clone)]
pub struct Daemon {
    transport: Arc<dyn NodeTransport>,
    timeout: Duration,
}

impl Daemon {
    pub fn new(transport: Arc<dyn NodeTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn transport(&self) -> &Arc<dyn NodeTransport> {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Call `method` and decode its result, failing with
    /// [`TransportError::Timeout`] once the timeout elapses.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, TransportError> {
        let value = tokio::time::timeout(self.timeout, self.transport.call(method, params))
            .await
            .map_err(|_| TransportError::Timeout {
                ms: self.timeout.as_millis() as u64,
            })??;
        serde_json::from_value(value).map_err(TransportError::Deserialization)
    }

    pub async fn get_topoheight(&self) -> Result<u64, ExplorerError> {
        Ok(self.call("get_topoheight", Value::Null).await?)
    }

    pub async fn get_info(&self) -> Result<NodeInfo, ExplorerError> {
        Ok(self.call("get_info", Value::Null).await?)
    }

    /// Blocks with `start..=end` topoheights, in the node's order (oldest first).
    ///
    /// Malformed entries are dropped with a warning; they never fail the page.
    pub async fn get_blocks_range_by_topoheight(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<Block>, ExplorerError> {
        let raw: Vec<Value> = self
            .call(
                "get_blocks_range_by_topoheight",
                json!({ "start_topoheight": start, "end_topoheight": end }),
            )
            .await?;
        Ok(raw
            .into_iter()
            .filter_map(|payload| match Block::from_payload(payload) {
                Ok(block) => Some(block),
                Err(e) => {
                    tracing::warn!(error = %e, start, end, "dropping malformed block in range");
                    None
                }
            })
            .collect())
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> Result<Block, ExplorerError> {
        let raw: Value = self.call("get_block_by_hash", json!({ "hash": hash })).await?;
        Block::from_payload(raw)
    }

    pub async fn get_account_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<HistoryEntry>, ExplorerError> {
        let raw: Vec<Value> = self.call("get_account_history", request.to_params()).await?;
        Ok(raw
            .into_iter()
            .filter_map(|payload| match HistoryEntry::from_payload(payload) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed history entry");
                    None
                }
            })
            .collect())
    }

    pub async fn get_balance(
        &self,
        address: &str,
        asset: &str,
    ) -> Result<AccountBalance, ExplorerError> {
        let raw: Value = self
            .call("get_balance", json!({ "address": address, "asset": asset }))
            .await?;
        AccountBalance::from_payload(raw)
    }

    pub async fn get_nonce(&self, address: &str) -> Result<AccountNonce, ExplorerError> {
        Ok(self.call("get_nonce", json!({ "address": address })).await?)
    }

    /// Hashes of every asset `address` holds.
    pub async fn get_account_assets(&self, address: &str) -> Result<Vec<String>, ExplorerError> {
        Ok(self
            .call("get_account_assets", json!({ "address": address }))
            .await?)
    }

    pub async fn get_asset(&self, asset: &str) -> Result<AssetData, ExplorerError> {
        Ok(self.call("get_asset", json!({ "asset": asset })).await?)
    }

    /// Fetch the page of `size` blocks ending at `upper_bound`
    /// (the newest blocks when `None`), newest first.
    pub async fn load_block_page(
        &self,
        upper_bound: Option<u64>,
        size: usize,
    ) -> Result<BlockPage, ExplorerError> {
        let topoheight = self.get_topoheight().await?;
        let (start, end) = page_range(upper_bound, topoheight, size);
        let mut blocks = self.get_blocks_range_by_topoheight(start, end).await?;
        blocks.reverse();
        Ok(BlockPage { topoheight, blocks })
    }
}
