//! Block window: a bounded, newest-first collection of recent blocks,
//! unique by hash, with a derived per-height grouping.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::error::ExplorerError;
use crate::types::{Block, BlockOrigin, BlockType};

/// Outcome of [`BlockWindow::upsert_front`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The hash was already held; the window is unchanged.
    Duplicate,
    /// The block was inserted at the front, possibly evicting the oldest one.
    Inserted { evicted: Option<Block> },
}

impl UpsertOutcome {
    /// Returns `true` if a genuinely new block entered the window.
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }

    /// Returns `true` if the insertion pushed the oldest block out.
    pub fn evicted(&self) -> bool {
        matches!(self, Self::Inserted { evicted: Some(_) })
    }
}

/// Blocks sharing one height, in window order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeightGroup {
    pub height: u64,
    pub blocks: Vec<Block>,
}

/// Bounded window of the most recent blocks (front = newest).
///
/// Eviction is strictly by window position: an unclassified block can be
/// evicted before a same-height sibling that is already classified.
#[derive(Debug, Clone)]
pub struct BlockWindow {
    blocks: VecDeque<Block>,
    hashes: HashSet<String>,
    capacity: usize,
}

impl BlockWindow {
    /// Create an empty window holding at most `capacity` blocks (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            blocks: VecDeque::with_capacity(capacity),
            hashes: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert `block` at the front unless its hash is already held.
    ///
    /// An already-held block is left untouched: identity fields are never
    /// overwritten from an event payload.
    pub fn upsert_front(&mut self, block: Block) -> UpsertOutcome {
        if self.hashes.contains(&block.hash) {
            return UpsertOutcome::Duplicate;
        }
        self.hashes.insert(block.hash.clone());
        self.blocks.push_front(block);

        let mut evicted = None;
        if self.blocks.len() > self.capacity {
            if let Some(old) = self.blocks.pop_back() {
                self.hashes.remove(&old.hash);
                evicted = Some(old);
            }
        }
        UpsertOutcome::Inserted { evicted }
    }

    /// Record the node's ordering decision for a held block.
    ///
    /// Returns [`ExplorerError::StaleData`] if the block already aged out.
    pub fn apply_ordering(
        &mut self,
        hash: &str,
        topoheight: u64,
        block_type: BlockType,
    ) -> Result<(), ExplorerError> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.hash == hash)
            .ok_or_else(|| ExplorerError::StaleData {
                hash: hash.to_string(),
            })?;
        block.topoheight = Some(topoheight);
        block.block_type = Some(block_type);
        Ok(())
    }

    /// Replace the whole window with a fetched page (newest first).
    ///
    /// Duplicates keep their first occurrence; the result is truncated to
    /// capacity.
    pub fn replace_all(&mut self, blocks: impl IntoIterator<Item = Block>) {
        self.blocks.clear();
        self.hashes.clear();
        for block in blocks {
            if self.blocks.len() == self.capacity {
                break;
            }
            if self.hashes.insert(block.hash.clone()) {
                self.blocks.push_back(block);
            }
        }
    }

    /// Install a freshly fetched live-tail page without losing live blocks.
    ///
    /// Range fetches only return ordered blocks, so any `Live` block held now
    /// and missing from `fetched` arrived while the fetch was in flight. Those
    /// stay in front, the fetched range follows.
    pub fn merge_live_tail(&mut self, fetched: Vec<Block>) {
        let fetched_hashes: HashSet<&str> = fetched.iter().map(|b| b.hash.as_str()).collect();
        let recent: Vec<Block> = self
            .blocks
            .iter()
            .filter(|b| b.origin == BlockOrigin::Live && !fetched_hashes.contains(b.hash.as_str()))
            .cloned()
            .collect();
        self.replace_all(recent.into_iter().chain(fetched));
    }

    /// Drop every block.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.hashes.clear();
    }

    /// Partition the window by height.
    ///
    /// Groups are ordered by the window position of their first member
    /// (newest first); members keep window order.
    pub fn group_by_height(&self) -> Vec<HeightGroup> {
        let mut groups: Vec<HeightGroup> = Vec::new();
        for block in &self.blocks {
            match groups.iter_mut().find(|g| g.height == block.height) {
                Some(group) => group.blocks.push(block.clone()),
                None => groups.push(HeightGroup {
                    height: block.height,
                    blocks: vec![block.clone()],
                }),
            }
        }
        groups
    }

    /// Blocks sharing `height`, in window order.
    pub fn siblings(&self, height: u64) -> Vec<Block> {
        self.blocks
            .iter()
            .filter(|b| b.height == height)
            .cloned()
            .collect()
    }

    /// Returns a block by hash if it's in the window.
    pub fn get(&self, hash: &str) -> Option<&Block> {
        if !self.hashes.contains(hash) {
            return None;
        }
        self.blocks.iter().find(|b| b.hash == hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Lowest topoheight held, the anchor source for paging to older blocks.
    pub fn oldest_topoheight(&self) -> Option<u64> {
        self.blocks.iter().filter_map(|b| b.topoheight).min()
    }

    /// Iterate newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Owned copy of the blocks, newest first.
    pub fn to_vec(&self) -> Vec<Block> {
        self.blocks.iter().cloned().collect()
    }

    /// Number of blocks in the window.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
