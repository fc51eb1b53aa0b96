//! Block-list view state machine.
//!
//! [`BlockListView::apply`] is the single place where the window and the
//! cursor change. It performs no I/O: network work comes back as [`Effect`]s
//! for the caller to run, and their results re-enter as [`ViewEvent`]s.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::classify::{classify_groups, ClassifiedBlock};
use crate::cursor::PageCursor;
use crate::daemon::BlockPage;
use crate::error::ExplorerError;
use crate::stats::RecentStats;
use crate::types::{Block, BlockOrdered, BlockOrigin, NodeInfo};
use crate::window::{BlockWindow, HeightGroup, UpsertOutcome};

/// Boundary and size of one page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// `None` fetches the newest blocks.
    pub upper_bound: Option<u64>,
    pub size: usize,
}

/// Inputs to the view, in the order the loop dequeues them.
#[derive(Debug)]
pub enum ViewEvent {
    /// Raw `NewBlock` payload.
    NewBlock(Value),
    /// Raw `BlockOrdered` payload.
    BlockOrdered(Value),
    PageLoaded {
        request: PageRequest,
        result: Result<BlockPage, ExplorerError>,
    },
    InfoLoaded(Result<NodeInfo, ExplorerError>),
    GoOlder,
    GoNewer,
    Reload,
}

/// Work requested by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchPage(PageRequest),
    RefreshInfo,
}

/// Immutable copy of the view handed to readers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewSnapshot {
    /// Every held block with its verdict, in group order.
    pub blocks: Vec<ClassifiedBlock>,
    pub groups: Vec<HeightGroup>,
    pub stable_height: u64,
    pub block_count: u64,
    /// Current page boundary, `None` on the live tail.
    pub anchor: Option<u64>,
    /// Hash of a block that just arrived live. Shown once.
    pub highlight: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ViewSnapshot {
    pub fn stats(&self) -> RecentStats {
        RecentStats::from_blocks(self.blocks.iter().map(|c| &c.block))
    }

    /// `max_topo=<anchor>` when off the live tail.
    pub fn query(&self) -> Option<String> {
        self.anchor
            .map(|anchor| format!("{}={anchor}", crate::cursor::QUERY_PARAM))
    }
}

/// The block list: a window of recent blocks plus the page cursor.
#[derive(Debug, Clone)]
pub struct BlockListView {
    window: BlockWindow,
    cursor: PageCursor,
    stable_height: u64,
    block_count: u64,
    highlight: Option<String>,
    loading: bool,
    error: Option<String>,
    refresh_info_on_block: bool,
}

impl BlockListView {
    pub fn new(page_size: usize, refresh_info_on_block: bool) -> Self {
        Self::with_cursor(page_size, refresh_info_on_block, PageCursor::new())
    }

    /// Start on the page `cursor` points at, e.g. one rebuilt from a query.
    pub fn with_cursor(page_size: usize, refresh_info_on_block: bool, cursor: PageCursor) -> Self {
        Self {
            window: BlockWindow::new(page_size),
            cursor,
            stable_height: 0,
            block_count: 0,
            highlight: None,
            loading: false,
            error: None,
            refresh_info_on_block,
        }
    }

    pub fn window(&self) -> &BlockWindow {
        &self.window
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn page_size(&self) -> usize {
        self.window.capacity()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Apply one event and return the effects it calls for.
    pub fn apply(&mut self, event: ViewEvent) -> Vec<Effect> {
        if !matches!(event, ViewEvent::NewBlock(_)) {
            self.highlight = None;
        }
        match event {
            ViewEvent::NewBlock(raw) => self.on_new_block(raw),
            ViewEvent::BlockOrdered(raw) => {
                self.on_block_ordered(raw);
                Vec::new()
            }
            ViewEvent::PageLoaded { request, result } => {
                self.on_page_loaded(request, result);
                Vec::new()
            }
            ViewEvent::InfoLoaded(result) => {
                match result {
                    Ok(info) => self.stable_height = info.stableheight,
                    Err(e) => warn!(error = %e, "node info refresh failed"),
                }
                Vec::new()
            }
            ViewEvent::GoOlder => self.go_older(),
            ViewEvent::GoNewer => {
                if self.cursor.go_newer() {
                    vec![self.fetch_current()]
                } else {
                    debug!("already on the live tail");
                    Vec::new()
                }
            }
            ViewEvent::Reload => vec![self.fetch_current()],
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let groups = self.window.group_by_height();
        ViewSnapshot {
            blocks: classify_groups(&groups, self.stable_height),
            groups,
            stable_height: self.stable_height,
            block_count: self.block_count,
            anchor: self.cursor.upper_bound(),
            highlight: self.highlight.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }

    fn on_new_block(&mut self, raw: Value) -> Vec<Effect> {
        if !self.cursor.is_live_tail() {
            debug!(anchor = ?self.cursor.upper_bound(), "discarding NewBlock off the live tail");
            return Vec::new();
        }
        let mut block = match Block::from_payload(raw) {
            Ok(block) => block,
            Err(e) => {
                warn!(error = %e, "dropping NewBlock event");
                return Vec::new();
            }
        };
        block.origin = BlockOrigin::Live;
        let hash = block.hash.clone();

        match self.window.upsert_front(block) {
            UpsertOutcome::Duplicate => {
                debug!(%hash, "duplicate NewBlock");
                Vec::new()
            }
            UpsertOutcome::Inserted { evicted } => {
                if let Some(old) = evicted {
                    debug!(hash = %old.hash, height = old.height, "evicted from window");
                }
                self.block_count += 1;
                self.highlight = Some(hash);
                if self.refresh_info_on_block {
                    vec![Effect::RefreshInfo]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn on_block_ordered(&mut self, raw: Value) {
        if !self.cursor.is_live_tail() {
            debug!(anchor = ?self.cursor.upper_bound(), "discarding BlockOrdered off the live tail");
            return;
        }
        let ordered = match BlockOrdered::from_payload(raw) {
            Ok(ordered) => ordered,
            Err(e) => {
                warn!(error = %e, "dropping BlockOrdered event");
                return;
            }
        };
        if let Err(e) = self.window.apply_ordering(
            &ordered.block_hash,
            ordered.topoheight,
            ordered.block_type,
        ) {
            warn!(error = %e, topoheight = ordered.topoheight, "ordering for block outside window");
        }
    }

    fn on_page_loaded(&mut self, request: PageRequest, result: Result<BlockPage, ExplorerError>) {
        if request.upper_bound != self.cursor.upper_bound() {
            debug!(
                boundary = ?request.upper_bound,
                current = ?self.cursor.upper_bound(),
                "dropping stale page response"
            );
            return;
        }
        self.loading = false;
        match result {
            Ok(page) => {
                self.error = None;
                self.block_count = page.topoheight + 1;
                if self.cursor.is_live_tail() {
                    self.window.merge_live_tail(page.blocks);
                } else {
                    self.window.replace_all(page.blocks);
                }
            }
            Err(e) => {
                warn!(error = %e, anchor = ?request.upper_bound, "page fetch failed");
                self.window.clear();
                self.block_count = 0;
                self.error = Some(e.to_string());
            }
        }
    }

    fn go_older(&mut self) -> Vec<Effect> {
        let Some(oldest) = self.window.oldest_topoheight() else {
            debug!("no ordered block on this page, cannot go older");
            return Vec::new();
        };
        match self.cursor.go_older(oldest) {
            Ok(_) => vec![self.fetch_current()],
            Err(e) => {
                debug!(error = %e, "go older rejected");
                Vec::new()
            }
        }
    }

    fn fetch_current(&mut self) -> Effect {
        self.loading = true;
        Effect::FetchPage(PageRequest {
            upper_bound: self.cursor.upper_bound(),
            size: self.page_size(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::page_range;
    use crate::types::testing::{block, hash, ordered, payload};
    use crate::types::BlockType;
    use dagview_rpc::TransportError;
    use serde_json::json;

    /// Run the single `FetchPage` in `effects` against a linear chain whose
    /// newest topoheight is `tip`.
    fn complete(view: &mut BlockListView, effects: Vec<Effect>, tip: u64) {
        let request = effects
            .into_iter()
            .find_map(|e| match e {
                Effect::FetchPage(r) => Some(r),
                Effect::RefreshInfo => None,
            })
            .expect("a page fetch");
        let (start, end) = page_range(request.upper_bound, tip, request.size);
        let blocks = (start..=end).rev().map(|i| ordered(i, i, i)).collect();
        view.apply(ViewEvent::PageLoaded {
            request,
            result: Ok(BlockPage {
                topoheight: tip,
                blocks,
            }),
        });
    }

    fn hashes(view: &BlockListView) -> Vec<String> {
        view.window().iter().map(|b| b.hash.clone()).collect()
    }

    fn ordered_event(id: u64, topoheight: u64, block_type: &str) -> ViewEvent {
        ViewEvent::BlockOrdered(json!({
            "block_hash": hash(id),
            "topoheight": topoheight,
            "block_type": block_type,
        }))
    }

    #[test]
    fn new_block_discarded_off_live_tail() {
        let mut view = BlockListView::new(5, true);
        let fx = view.apply(ViewEvent::Reload);
        complete(&mut view, fx, 100);
        let fx = view.apply(ViewEvent::GoOlder);
        complete(&mut view, fx, 100);
        let fx = view.apply(ViewEvent::GoOlder);
        complete(&mut view, fx, 100);
        assert_eq!(view.cursor().index(), Some(1));
        assert_eq!(view.cursor().anchors(), &[95, 90]);

        let before = view.window().to_vec();
        let fx = view.apply(ViewEvent::NewBlock(payload(&block(500, 101))));
        assert!(fx.is_empty());
        view.apply(ordered_event(90, 7, "Side"));
        assert_eq!(view.window().to_vec(), before);
    }

    #[test]
    fn new_block_on_live_tail_inserts_and_evicts() {
        let mut view = BlockListView::new(5, true);
        let fx = view.apply(ViewEvent::Reload);
        complete(&mut view, fx, 100);
        assert_eq!(view.window().len(), 5);

        let fx = view.apply(ViewEvent::NewBlock(payload(&block(500, 101))));
        assert_eq!(fx, vec![Effect::RefreshInfo]);
        let held = hashes(&view);
        assert_eq!(held.len(), 5);
        assert_eq!(held[0], hash(500));
        assert!(!view.window().contains(&hash(96)));
        assert_eq!(view.snapshot().block_count, 102);
    }

    #[test]
    fn evicted_block_ordering_is_noop() {
        let mut view = BlockListView::new(3, false);
        let fx = view.apply(ViewEvent::Reload);
        complete(&mut view, fx, 3);
        assert_eq!(hashes(&view), vec![hash(3), hash(2), hash(1)]);

        view.apply(ViewEvent::NewBlock(payload(&block(4, 4))));
        assert_eq!(hashes(&view), vec![hash(4), hash(3), hash(2)]);

        let before = view.window().to_vec();
        let fx = view.apply(ordered_event(1, 100, "Sync"));
        assert!(fx.is_empty());
        assert_eq!(view.window().to_vec(), before);
    }

    #[test]
    fn duplicate_new_block_is_idempotent() {
        let mut once = BlockListView::new(4, true);
        let mut twice = BlockListView::new(4, true);
        let raw = payload(&block(9, 9));

        once.apply(ViewEvent::NewBlock(raw.clone()));
        twice.apply(ViewEvent::NewBlock(raw.clone()));
        let fx = twice.apply(ViewEvent::NewBlock(raw));

        assert!(fx.is_empty());
        assert_eq!(once.window().to_vec(), twice.window().to_vec());
        assert_eq!(twice.snapshot().block_count, 1);
    }

    #[test]
    fn highlight_is_one_shot() {
        let mut view = BlockListView::new(4, false);
        view.apply(ViewEvent::NewBlock(payload(&block(1, 1))));
        assert_eq!(view.snapshot().highlight, Some(hash(1)));

        view.apply(ViewEvent::InfoLoaded(Ok(NodeInfo::default())));
        assert_eq!(view.snapshot().highlight, None);
    }

    #[test]
    fn live_block_classified_once_group_is_ordered() {
        let mut view = BlockListView::new(6, false);
        view.apply(ViewEvent::InfoLoaded(Ok(NodeInfo {
            stableheight: 10,
            ..Default::default()
        })));
        view.apply(ViewEvent::NewBlock(payload(&block(1, 20))));
        view.apply(ViewEvent::NewBlock(payload(&block(2, 20))));
        view.apply(ordered_event(2, 41, "Side"));

        let verdicts: Vec<BlockType> = view.snapshot().blocks.iter().map(|c| c.verdict).collect();
        assert_eq!(verdicts, vec![BlockType::Unclassified, BlockType::Unclassified]);

        view.apply(ordered_event(1, 40, "Side"));
        let snap = view.snapshot();
        let verdict_of = |id: u64| {
            snap.blocks
                .iter()
                .find(|c| c.block.hash == hash(id))
                .map(|c| c.verdict)
        };
        assert_eq!(verdict_of(1), Some(BlockType::Sync));
        assert_eq!(verdict_of(2), Some(BlockType::Side));
        assert_eq!(snap.groups.len(), 1);
    }

    #[test]
    fn stale_page_response_dropped() {
        let mut view = BlockListView::new(5, false);
        let fx = view.apply(ViewEvent::Reload);
        complete(&mut view, fx, 50);

        let first = view.apply(ViewEvent::Reload);
        let older = view.apply(ViewEvent::GoOlder);
        assert_eq!(view.cursor().upper_bound(), Some(45));

        // the live-tail reload completes after the user paged back
        complete(&mut view, first, 60);
        assert!(view.is_loading());
        assert!(!view.window().contains(&hash(60)));

        complete(&mut view, older, 60);
        assert!(!view.is_loading());
        assert_eq!(view.window().iter().next().and_then(|b| b.topoheight), Some(45));
        assert_eq!(view.snapshot().query().as_deref(), Some("max_topo=45"));
    }

    #[test]
    fn live_tail_fetch_keeps_blocks_that_arrived_meanwhile() {
        let mut view = BlockListView::new(4, false);
        let fx = view.apply(ViewEvent::Reload);
        view.apply(ViewEvent::NewBlock(payload(&block(900, 31))));
        complete(&mut view, fx, 30);

        assert_eq!(
            hashes(&view),
            vec![hash(900), hash(30), hash(29), hash(28)]
        );
    }

    #[test]
    fn failed_fetch_clears_window() {
        let mut view = BlockListView::new(3, false);
        let fx = view.apply(ViewEvent::Reload);
        complete(&mut view, fx, 10);

        let fx = view.apply(ViewEvent::Reload);
        let Some(Effect::FetchPage(request)) = fx.into_iter().next() else {
            panic!("expected fetch");
        };
        view.apply(ViewEvent::PageLoaded {
            request,
            result: Err(TransportError::NotConnected.into()),
        });
        let snap = view.snapshot();
        assert!(snap.blocks.is_empty());
        assert_eq!(snap.block_count, 0);
        assert!(snap.error.is_some());
        assert!(!snap.loading);
    }

    #[test]
    fn paging_edges_are_noops() {
        let mut view = BlockListView::new(3, false);
        assert!(view.apply(ViewEvent::GoNewer).is_empty());
        assert!(view.apply(ViewEvent::GoOlder).is_empty());

        let fx = view.apply(ViewEvent::Reload);
        complete(&mut view, fx, 2);
        // topoheights 2, 1, 0: nothing older than genesis
        assert!(view.apply(ViewEvent::GoOlder).is_empty());
        assert!(view.cursor().is_live_tail());
    }

    #[test]
    fn malformed_events_are_dropped() {
        let mut view = BlockListView::new(3, true);
        assert!(view
            .apply(ViewEvent::NewBlock(json!({ "hash": "zz", "height": 1 })))
            .is_empty());
        view.apply(ViewEvent::BlockOrdered(json!({ "topoheight": 1 })));
        assert!(view.window().is_empty());
    }
}
