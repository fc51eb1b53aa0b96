//! Account history paging, anchored on topoheight.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::cursor::PageCursor;
use crate::daemon::Daemon;
use crate::error::ExplorerError;

/// What a history entry records for the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HistoryKind {
    Mining { reward: u64 },
    Burn { amount: u64 },
    Outgoing { amount: Option<u64> },
    Incoming { amount: Option<u64> },
    Unknown,
}

/// One row of an account's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub topoheight: u64,
    /// Transaction hash, or block hash for mining rewards.
    pub hash: String,
    pub block_timestamp: u64,
    pub kind: HistoryKind,
}

#[derive(Deserialize)]
struct Reward {
    reward: u64,
}

#[derive(Deserialize)]
struct Amount {
    #[serde(default)]
    amount: Option<u64>,
}

#[derive(Deserialize)]
struct RawHistoryEntry {
    topoheight: u64,
    hash: String,
    #[serde(default)]
    block_timestamp: u64,
    mining: Option<Reward>,
    burn: Option<Amount>,
    outgoing: Option<Amount>,
    incoming: Option<Amount>,
}

impl HistoryEntry {
    pub fn from_payload(payload: Value) -> Result<Self, ExplorerError> {
        let raw: RawHistoryEntry = serde_json::from_value(payload)
            .map_err(|e| ExplorerError::validation(format!("history entry: {e}")))?;
        // first matching variant wins
        let kind = if let Some(m) = raw.mining {
            HistoryKind::Mining { reward: m.reward }
        } else if let Some(b) = raw.burn {
            HistoryKind::Burn {
                amount: b.amount.unwrap_or_default(),
            }
        } else if let Some(o) = raw.outgoing {
            HistoryKind::Outgoing { amount: o.amount }
        } else if let Some(i) = raw.incoming {
            HistoryKind::Incoming { amount: i.amount }
        } else {
            HistoryKind::Unknown
        };
        Ok(Self {
            topoheight: raw.topoheight,
            hash: raw.hash,
            block_timestamp: raw.block_timestamp,
            kind,
        })
    }
}

/// Parameters of one `get_account_history` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub address: String,
    pub asset: Option<String>,
    pub maximum_topoheight: Option<u64>,
}

impl HistoryRequest {
    pub fn to_params(&self) -> Value {
        let mut params = json!({ "address": self.address });
        if let Some(asset) = &self.asset {
            params["asset"] = json!(asset);
        }
        if let Some(max) = self.maximum_topoheight {
            params["maximum_topoheight"] = json!(max);
        }
        params
    }
}

/// Pages through one account's history, newest first.
#[derive(Debug, Clone)]
pub struct HistoryPager {
    address: String,
    asset: Option<String>,
    cursor: PageCursor,
    entries: Vec<HistoryEntry>,
    error: Option<String>,
}

impl HistoryPager {
    pub fn new(address: impl Into<String>, asset: Option<String>, cursor: PageCursor) -> Self {
        Self {
            address: address.into(),
            asset,
            cursor,
            entries: Vec::new(),
            error: None,
        }
    }

    /// The request for the current page boundary.
    pub fn request(&self) -> HistoryRequest {
        HistoryRequest {
            address: self.address.clone(),
            asset: self.asset.clone(),
            maximum_topoheight: self.cursor.upper_bound(),
        }
    }

    /// Install a fetch result. Returns `false` and drops it when it was issued
    /// for a boundary the cursor has since left.
    pub fn apply(
        &mut self,
        request: &HistoryRequest,
        result: Result<Vec<HistoryEntry>, ExplorerError>,
    ) -> bool {
        if request.maximum_topoheight != self.cursor.upper_bound() {
            tracing::debug!(
                boundary = ?request.maximum_topoheight,
                current = ?self.cursor.upper_bound(),
                "dropping stale history page"
            );
            return false;
        }
        match result {
            Ok(entries) => {
                self.entries = entries;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, address = %self.address, "history fetch failed");
                self.entries.clear();
                self.error = Some(e.to_string());
            }
        }
        true
    }

    /// Move one page toward older history, anchored below the oldest shown entry.
    pub fn go_older(&mut self) -> Result<HistoryRequest, ExplorerError> {
        let oldest = self
            .entries
            .iter()
            .map(|e| e.topoheight)
            .min()
            .ok_or_else(|| ExplorerError::validation("no entries on this page"))?;
        self.cursor.go_older(oldest)?;
        Ok(self.request())
    }

    /// Move one page toward the head; `None` when already on the newest page.
    pub fn go_newer(&mut self) -> Option<HistoryRequest> {
        self.cursor.go_newer().then(|| self.request())
    }

    /// Fetch the current page. Not connected is a no-op.
    pub async fn load(&mut self, daemon: &Daemon) {
        if !daemon.is_connected() {
            tracing::debug!("not connected, skipping history load");
            return;
        }
        let request = self.request();
        let result = daemon.get_account_history(&request).await;
        self.apply(&request, result);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagview_rpc::{MemoryTransport, TransportError};
    use std::sync::Arc;
    use std::time::Duration;

    fn entry(topo: u64) -> Value {
        json!({
            "topoheight": topo,
            "hash": format!("{topo:064x}"),
            "block_timestamp": topo * 1000,
            "incoming": { "from": "xel:other" }
        })
    }

    /// History with one entry per topoheight from `tip` down to 0, 3 per page.
    fn history_transport(tip: u64) -> Arc<MemoryTransport> {
        let t = Arc::new(MemoryTransport::new());
        t.respond_with("get_account_history", move |params| {
            let max = params["maximum_topoheight"].as_u64().unwrap_or(tip);
            Ok(Value::Array((0..=max).rev().take(3).map(entry).collect()))
        });
        t
    }

    #[test]
    fn entry_kinds() {
        let mining = HistoryEntry::from_payload(json!({
            "topoheight": 5, "hash": "aa", "mining": { "reward": 90 }
        }))
        .unwrap();
        assert_eq!(mining.kind, HistoryKind::Mining { reward: 90 });

        let out = HistoryEntry::from_payload(json!({
            "topoheight": 6, "hash": "bb", "outgoing": { "to": "xel:x" }
        }))
        .unwrap();
        assert_eq!(out.kind, HistoryKind::Outgoing { amount: None });

        let burn = HistoryEntry::from_payload(json!({
            "topoheight": 7, "hash": "cc", "burn": { "amount": 12 }
        }))
        .unwrap();
        assert_eq!(burn.kind, HistoryKind::Burn { amount: 12 });

        let odd = HistoryEntry::from_payload(json!({ "topoheight": 8, "hash": "dd" })).unwrap();
        assert_eq!(odd.kind, HistoryKind::Unknown);

        assert!(HistoryEntry::from_payload(json!({ "hash": "ee" })).is_err());
    }

    #[test]
    fn request_params() {
        let req = HistoryRequest {
            address: "xel:abc".into(),
            asset: None,
            maximum_topoheight: Some(41),
        };
        assert_eq!(
            req.to_params(),
            json!({ "address": "xel:abc", "maximum_topoheight": 41 })
        );
    }

    #[tokio::test]
    async fn pages_backward_and_forward() {
        let daemon = Daemon::new(history_transport(10), Duration::from_secs(1));
        let mut pager = HistoryPager::new("xel:abc", None, PageCursor::new());

        pager.load(&daemon).await;
        let topos: Vec<u64> = pager.entries().iter().map(|e| e.topoheight).collect();
        assert_eq!(topos, vec![10, 9, 8]);

        let req = pager.go_older().unwrap();
        assert_eq!(req.maximum_topoheight, Some(7));
        pager.load(&daemon).await;
        let topos: Vec<u64> = pager.entries().iter().map(|e| e.topoheight).collect();
        assert_eq!(topos, vec![7, 6, 5]);
        assert_eq!(pager.cursor().to_query().as_deref(), Some("max_topo=7"));

        assert!(pager.go_newer().is_some());
        pager.load(&daemon).await;
        assert_eq!(pager.entries()[0].topoheight, 10);
        assert!(pager.go_newer().is_none());
    }

    #[test]
    fn stale_response_is_dropped() {
        let mut pager = HistoryPager::new("xel:abc", None, PageCursor::new());
        let first = pager.request();
        pager.apply(&first, Ok(vec![HistoryEntry::from_payload(entry(20)).unwrap()]));
        pager.go_older().unwrap();

        // late answer for the newest page arrives after the user paged back
        let applied = pager.apply(&first, Ok(vec![]));
        assert!(!applied);
        assert_eq!(pager.entries().len(), 1);
    }

    #[test]
    fn failed_fetch_clears_and_records_error() {
        let mut pager = HistoryPager::new("xel:abc", None, PageCursor::new());
        let req = pager.request();
        pager.apply(&req, Err(TransportError::Timeout { ms: 10 }.into()));
        assert!(pager.entries().is_empty());
        assert!(pager.error().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn not_connected_is_noop() {
        let t = history_transport(5);
        t.set_connected(false);
        let daemon = Daemon::new(t.clone(), Duration::from_secs(1));
        let mut pager = HistoryPager::new("xel:abc", None, PageCursor::new());
        pager.load(&daemon).await;
        assert!(pager.error().is_none());
        assert_eq!(t.call_count("get_account_history"), 0);
    }
}
