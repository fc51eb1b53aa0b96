//! Page cursor: a stack of topoheight anchors for reverse-chronological
//! paging that does not drift when new blocks arrive at the head.

use serde::{Deserialize, Serialize};

use crate::error::ExplorerError;

/// Query parameter carrying the current page boundary.
pub const QUERY_PARAM: &str = "max_topo";

/// Position in a reverse-chronological history.
///
/// Each step toward older history pushes an anchor, the highest topoheight
/// the next page may contain. Anchors strictly decrease from bottom to top.
/// An empty stack is the live tail (page 1, no upper bound).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    anchors: Vec<u64>,
}

impl PageCursor {
    /// A cursor on the live tail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a cursor from a `max_topo` query value.
    ///
    /// A missing or unparsable value yields the live tail.
    pub fn from_query(value: Option<&str>) -> Self {
        match value.and_then(|v| v.trim().parse::<u64>().ok()) {
            Some(anchor) => Self {
                anchors: vec![anchor],
            },
            None => Self::new(),
        }
    }

    /// Render the query string for the current boundary, `None` on the live tail.
    pub fn to_query(&self) -> Option<String> {
        self.upper_bound().map(|anchor| format!("{QUERY_PARAM}={anchor}"))
    }

    /// Page index: `None` on the live tail, `Some(0)` one page back, ...
    pub fn index(&self) -> Option<usize> {
        self.anchors.len().checked_sub(1)
    }

    /// Returns `true` when on page 1, where live events apply.
    pub fn is_live_tail(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Highest topoheight the current page may contain; `None` = newest.
    pub fn upper_bound(&self) -> Option<u64> {
        self.anchors.last().copied()
    }

    pub fn anchors(&self) -> &[u64] {
        &self.anchors
    }

    /// Step toward older history.
    ///
    /// `oldest_topoheight` is the lowest topoheight shown on the current page.
    /// Returns the new anchor. Fails without changing the cursor when there is
    /// nothing older or the anchor would not strictly decrease.
    pub fn go_older(&mut self, oldest_topoheight: u64) -> Result<u64, ExplorerError> {
        let anchor = oldest_topoheight
            .checked_sub(1)
            .ok_or_else(|| ExplorerError::validation("no history older than topoheight 0"))?;
        if let Some(top) = self.upper_bound() {
            if anchor >= top {
                return Err(ExplorerError::validation(format!(
                    "anchor {anchor} does not precede current boundary {top}"
                )));
            }
        }
        self.anchors.push(anchor);
        Ok(anchor)
    }

    /// Step back toward the head. Returns `false` (no-op) on the live tail.
    pub fn go_newer(&mut self) -> bool {
        self.anchors.pop().is_some()
    }

    /// Jump back to the live tail.
    pub fn reset(&mut self) {
        self.anchors.clear();
    }
}

/// Inclusive topoheight range for one page of blocks, newest bound first.
///
/// `end` is the anchor (or the current topoheight on the live tail), clamped
/// to the current topoheight; `start` lies `size - 1` below, saturating at 0.
pub fn page_range(upper_bound: Option<u64>, current_topoheight: u64, size: usize) -> (u64, u64) {
    let end = upper_bound.map_or(current_topoheight, |anchor| anchor.min(current_topoheight));
    let span = (size.max(1) - 1) as u64;
    (end.saturating_sub(span), end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_live_tail() {
        let c = PageCursor::new();
        assert!(c.is_live_tail());
        assert_eq!(c.index(), None);
        assert_eq!(c.upper_bound(), None);
        assert_eq!(c.to_query(), None);
    }

    #[test]
    fn go_older_then_newer() {
        let mut c = PageCursor::new();
        assert_eq!(c.go_older(42).unwrap(), 41);
        assert_eq!(c.go_older(10).unwrap(), 9);
        assert_eq!(c.anchors(), &[41, 9]);
        assert_eq!(c.index(), Some(1));

        assert!(c.go_newer());
        assert_eq!(c.anchors(), &[41]);
        assert_eq!(c.index(), Some(0));
        assert_eq!(c.upper_bound(), Some(41));
    }

    #[test]
    fn go_newer_on_live_tail_is_noop() {
        let mut c = PageCursor::new();
        assert!(!c.go_newer());
        assert_eq!(c, PageCursor::new());
    }

    #[test]
    fn anchors_strictly_decrease() {
        let mut c = PageCursor::new();
        let moves: [(bool, u64); 9] = [
            (true, 500), (true, 480), (false, 0), (true, 470), (true, 470),
            (true, 900), (true, 300), (false, 0), (true, 100),
        ];
        for (older, topo) in moves {
            if older {
                let _ = c.go_older(topo);
            } else {
                c.go_newer();
            }
            assert!(c.anchors().windows(2).all(|w| w[0] > w[1]), "{:?}", c.anchors());
        }
        assert_eq!(c.anchors(), &[499, 469, 99]);
    }

    #[test]
    fn go_older_rejects_bad_anchor_without_change() {
        let mut c = PageCursor::new();
        assert!(c.go_older(0).unwrap_err().is_validation());
        assert!(c.is_live_tail());

        c.go_older(50).unwrap();
        assert!(c.go_older(60).unwrap_err().is_validation());
        assert!(c.go_older(50).unwrap_err().is_validation());
        assert_eq!(c.anchors(), &[49]);
    }

    #[test]
    fn query_roundtrip() {
        let mut c = PageCursor::new();
        c.go_older(1001).unwrap();
        let q = c.to_query().unwrap();
        assert_eq!(q, "max_topo=1000");

        let restored = PageCursor::from_query(q.strip_prefix("max_topo="));
        assert_eq!(restored.upper_bound(), Some(1000));
        assert_eq!(restored.index(), Some(0));

        assert!(PageCursor::from_query(Some("abc")).is_live_tail());
        assert!(PageCursor::from_query(None).is_live_tail());
    }

    #[test]
    fn page_range_derivation() {
        assert_eq!(page_range(None, 1000, 20), (981, 1000));
        assert_eq!(page_range(Some(499), 1000, 20), (480, 499));
        // anchor above the current head is clamped
        assert_eq!(page_range(Some(5000), 1000, 10), (991, 1000));
        // near genesis
        assert_eq!(page_range(Some(3), 1000, 20), (0, 3));
        assert_eq!(page_range(None, 0, 0), (0, 0));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        /// `Some(oldest)` steps older from a page whose lowest topoheight is
        /// `oldest`, `None` steps newer.
        fn arb_moves() -> impl Strategy<Value = Vec<Option<u64>>> {
            prop::collection::vec(prop::option::weighted(0.7, 0u64..2_000), 0..48)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(128))]

            #[test]
            fn anchors_strictly_decrease_for_any_moves(moves in arb_moves()) {
                let mut c = PageCursor::new();
                for step in moves {
                    let before = c.clone();
                    match step {
                        Some(oldest) => match c.go_older(oldest) {
                            Ok(anchor) => {
                                prop_assert_eq!(anchor, oldest - 1);
                                prop_assert_eq!(c.upper_bound(), Some(anchor));
                            }
                            Err(e) => {
                                prop_assert!(e.is_validation());
                                prop_assert_eq!(&c, &before);
                            }
                        },
                        None => {
                            let moved = c.go_newer();
                            prop_assert_eq!(moved, !before.is_live_tail());
                        }
                    }
                    prop_assert!(c.anchors().windows(2).all(|w| w[0] > w[1]));
                    prop_assert_eq!(c.index(), c.anchors().len().checked_sub(1));
                }
            }

            #[test]
            fn go_newer_on_live_tail_never_moves(pops in 1usize..16) {
                let mut c = PageCursor::new();
                for _ in 0..pops {
                    prop_assert!(!c.go_newer());
                    prop_assert!(c.is_live_tail());
                    prop_assert_eq!(c.to_query(), None);
                }
            }

            #[test]
            fn page_range_spans_size(upper in prop::option::of(0u64..5_000), head in 0u64..5_000, size in 1usize..100) {
                let (start, end) = page_range(upper, head, size);
                prop_assert!(start <= end);
                prop_assert!(end <= head);
                prop_assert!(end - start < size as u64);
                if let Some(anchor) = upper {
                    prop_assert!(end <= anchor);
                }
            }
        }
    }
}
