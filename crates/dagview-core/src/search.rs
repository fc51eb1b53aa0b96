//! Free-text search: decide what the user typed and look it up.

use serde::Serialize;

use crate::daemon::Daemon;
use crate::error::ExplorerError;
use crate::types::{is_hash, Block};

/// Length of an encoded account address.
pub const ADDRESS_LEN: usize = 65;

/// What a search string refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SearchTarget {
    Account(String),
    /// A hash not yet resolved to a block or a transaction.
    Hash(String),
    Topoheight(u64),
    Block(Box<Block>),
    Transaction(String),
}

/// Classify `input` without touching the node. `None` if it matches nothing.
pub fn parse(input: &str) -> Option<SearchTarget> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input.len() == ADDRESS_LEN {
        return Some(SearchTarget::Account(input.to_string()));
    }
    if is_hash(input) {
        return Some(SearchTarget::Hash(input.to_ascii_lowercase()));
    }
    input.parse::<u64>().ok().map(SearchTarget::Topoheight)
}

/// Parse `input` and resolve hashes: a known block hash becomes
/// [`SearchTarget::Block`], anything else is taken as a transaction.
pub async fn resolve(daemon: &Daemon, input: &str) -> Result<SearchTarget, ExplorerError> {
    let target = parse(input)
        .ok_or_else(|| ExplorerError::validation(format!("nothing matches `{}`", input.trim())))?;
    let SearchTarget::Hash(hash) = target else {
        return Ok(target);
    };
    match daemon.get_block_by_hash(&hash).await {
        Ok(block) => Ok(SearchTarget::Block(Box::new(block))),
        Err(ExplorerError::Transport(e)) if e.is_node_error() => {
            tracing::debug!(%hash, "not a block hash, assuming transaction");
            Ok(SearchTarget::Transaction(hash))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::testing::{hash, ordered, payload};
    use dagview_rpc::{JsonRpcError, MemoryTransport, TransportError};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn parse_inputs() {
        assert_eq!(parse("   "), None);
        assert_eq!(parse("1234"), Some(SearchTarget::Topoheight(1234)));
        assert_eq!(parse(&hash(7)), Some(SearchTarget::Hash(hash(7))));
        let addr = format!("xel:{}", "q".repeat(61));
        assert_eq!(parse(&addr), Some(SearchTarget::Account(addr.clone())));
        assert_eq!(parse("not-a-thing"), None);
    }

    fn daemon_knowing(known: Vec<String>) -> Daemon {
        let t = Arc::new(MemoryTransport::new());
        t.respond_with("get_block_by_hash", move |params| {
            let wanted = params["hash"].as_str().unwrap_or_default();
            if known.iter().any(|h| h == wanted) {
                Ok(payload(&ordered(3, 3, 3)))
            } else {
                Err(TransportError::Rpc(JsonRpcError {
                    code: -32004,
                    message: "not found".into(),
                    data: None::<Value>,
                }))
            }
        });
        Daemon::new(t, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn resolves_block_or_transaction() {
        let daemon = daemon_knowing(vec![hash(3)]);
        match resolve(&daemon, &hash(3)).await.unwrap() {
            SearchTarget::Block(b) => assert_eq!(b.hash, hash(3)),
            other => panic!("expected block, got {other:?}"),
        }
        assert_eq!(
            resolve(&daemon, &hash(4)).await.unwrap(),
            SearchTarget::Transaction(hash(4))
        );
        assert_eq!(
            resolve(&daemon, "88").await.unwrap(),
            SearchTarget::Topoheight(88)
        );
        assert!(resolve(&daemon, "??").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn transport_failure_is_not_a_transaction() {
        let t = Arc::new(MemoryTransport::new());
        t.set_connected(false);
        let daemon = Daemon::new(t, Duration::from_secs(1));
        assert!(resolve(&daemon, &hash(1)).await.unwrap_err().is_transport());
    }
}
