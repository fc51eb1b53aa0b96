//! dagview-core — block window reconciliation for a blockDAG explorer.
//!
//! # Architecture
//!
//! ```text
//! NodeTransport ──► ReconcileLoop (single writer, mpsc queue)
//!                      ├── BlockListView     (apply(event) -> effects)
//!                      │     ├── BlockWindow  (bounded, unique by hash)
//!                      │     ├── PageCursor   (topoheight anchor stack)
//!                      │     └── classify     (pure verdicts per height group)
//!                      ├── Daemon            (typed calls with timeout)
//!                      └── watch<ViewSnapshot> ──► readers
//!
//! AccountSummary, HistoryPager (account history on the same cursor)
//! RecentStats, search::resolve
//! ```

pub mod account;
pub mod classify;
pub mod config;
pub mod cursor;
pub mod daemon;
pub mod error;
pub mod history;
pub mod reconcile;
pub mod search;
pub mod stats;
pub mod types;
pub mod view;
pub mod window;

pub use account::{AccountBalance, AccountNonce, AccountSummary, AssetData, NATIVE_ASSET};
pub use classify::{classify, ClassifiedBlock};
pub use config::{ExplorerConfig, LogConfig};
pub use cursor::{page_range, PageCursor};
pub use daemon::{BlockPage, Daemon};
pub use error::ExplorerError;
pub use history::{HistoryEntry, HistoryKind, HistoryPager, HistoryRequest};
pub use reconcile::{ReconcileLoop, ViewHandle};
pub use search::SearchTarget;
pub use stats::RecentStats;
pub use types::{Block, BlockOrdered, BlockOrigin, BlockType, NodeInfo};
pub use view::{BlockListView, Effect, PageRequest, ViewEvent, ViewSnapshot};
pub use window::{BlockWindow, HeightGroup, UpsertOutcome};
