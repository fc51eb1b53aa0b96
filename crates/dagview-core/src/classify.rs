//! Block classification, a pure mapping from a block, the node's stable
//! height and the block's height siblings to a [`BlockType`] verdict.
//!
//! Policy:
//! 1. No topoheight yet → `Unclassified`.
//! 2. At or below the stable height the verdict is final: the node-reported
//!    type when present, otherwise inferred from the siblings.
//! 3. Above the stable height, any unordered sibling makes the whole group
//!    `Unclassified`. Otherwise a fetched block keeps the node-reported type,
//!    and a live block is inferred: lowest topoheight is `Sync`, the rest
//!    are `Side`.

use serde::Serialize;

use crate::types::{Block, BlockOrigin, BlockType};
use crate::window::HeightGroup;

/// A block paired with its current verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedBlock {
    pub block: Block,
    pub verdict: BlockType,
}

/// Classify `block` given the stable height and the blocks sharing its height.
///
/// `group` may or may not contain `block` itself; members at other heights
/// are ignored.
pub fn classify(block: &Block, stable_height: u64, group: &[Block]) -> BlockType {
    let Some(topoheight) = block.topoheight else {
        return BlockType::Unclassified;
    };

    if block.height <= stable_height {
        return block
            .block_type
            .unwrap_or_else(|| infer(block, topoheight, group));
    }

    let any_unordered = group
        .iter()
        .any(|b| b.height == block.height && b.topoheight.is_none());
    if any_unordered {
        return BlockType::Unclassified;
    }

    match (block.origin, block.block_type) {
        (BlockOrigin::Fetched, Some(reported)) => reported,
        _ => infer(block, topoheight, group),
    }
}

/// Lowest topoheight among the siblings is the canonical member.
fn infer(block: &Block, topoheight: u64, group: &[Block]) -> BlockType {
    let lowest_other = group
        .iter()
        .filter(|b| b.height == block.height && b.hash != block.hash)
        .filter_map(|b| b.topoheight)
        .min();
    match lowest_other {
        Some(other) if other < topoheight => BlockType::Side,
        _ => BlockType::Sync,
    }
}

/// Classify every block of a grouped window, preserving group order.
pub fn classify_groups(groups: &[HeightGroup], stable_height: u64) -> Vec<ClassifiedBlock> {
    groups
        .iter()
        .flat_map(|group| {
            group.blocks.iter().map(move |block| ClassifiedBlock {
                verdict: classify(block, stable_height, &group.blocks),
                block: block.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::testing::{block, live, ordered};

    fn live_ordered(id: u64, height: u64, topo: u64) -> Block {
        Block {
            topoheight: Some(topo),
            ..live(id, height)
        }
    }

    #[test]
    fn unordered_block_is_unclassified() {
        let b = block(1, 10);
        assert_eq!(classify(&b, 0, &[b.clone()]), BlockType::Unclassified);
        assert_eq!(classify(&b, 100, &[b.clone()]), BlockType::Unclassified);
    }

    #[test]
    fn lowest_topoheight_in_full_group_is_sync() {
        let group = vec![
            live_ordered(1, 50, 102),
            live_ordered(2, 50, 100),
            live_ordered(3, 50, 101),
        ];
        let verdicts: Vec<BlockType> = group.iter().map(|b| classify(b, 40, &group)).collect();
        assert_eq!(verdicts, vec![BlockType::Side, BlockType::Sync, BlockType::Side]);
    }

    #[test]
    fn any_unordered_sibling_above_stable_makes_group_unclassified() {
        let group = vec![live_ordered(1, 50, 100), live_ordered(2, 50, 101), live(3, 50)];
        for b in &group {
            assert_eq!(classify(b, 49, &group), BlockType::Unclassified);
        }
    }

    #[test]
    fn below_stable_uses_node_type_even_with_unordered_sibling() {
        let mut side = ordered(1, 10, 20);
        side.block_type = Some(BlockType::Side);
        let group = vec![side.clone(), block(2, 10)];
        assert_eq!(classify(&side, 10, &group), BlockType::Side);
    }

    #[test]
    fn below_stable_without_node_type_is_inferred() {
        let group = vec![ordered(1, 10, 21), ordered(2, 10, 20)];
        assert_eq!(classify(&group[0], 15, &group), BlockType::Side);
        assert_eq!(classify(&group[1], 15, &group), BlockType::Sync);
    }

    #[test]
    fn fetched_block_above_stable_keeps_reported_type() {
        let mut b = ordered(1, 60, 300);
        b.block_type = Some(BlockType::Normal);
        let sibling = ordered(2, 60, 299);
        let group = vec![b.clone(), sibling];
        // inference would say Side; the node's report wins for fetched blocks
        assert_eq!(classify(&b, 50, &group), BlockType::Normal);
    }

    #[test]
    fn live_block_above_stable_ignores_reported_type() {
        let mut b = live_ordered(1, 60, 299);
        b.block_type = Some(BlockType::Side);
        let group = vec![b.clone(), live_ordered(2, 60, 300)];
        assert_eq!(classify(&b, 50, &group), BlockType::Sync);
    }

    #[test]
    fn lone_ordered_block_is_sync() {
        let b = live_ordered(1, 70, 500);
        assert_eq!(classify(&b, 10, &[]), BlockType::Sync);
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let group = vec![live_ordered(1, 5, 9), live_ordered(2, 5, 8)];
        let first = classify(&group[0], 0, &group);
        for _ in 0..10 {
            assert_eq!(classify(&group[0], 0, &group), first);
        }
    }

    #[test]
    fn classify_groups_flattens_in_order() {
        let groups = vec![
            HeightGroup { height: 2, blocks: vec![live_ordered(3, 2, 11)] },
            HeightGroup { height: 1, blocks: vec![live_ordered(2, 1, 10), live_ordered(1, 1, 9)] },
        ];
        let out = classify_groups(&groups, 0);
        let verdicts: Vec<BlockType> = out.iter().map(|c| c.verdict).collect();
        assert_eq!(verdicts, vec![BlockType::Sync, BlockType::Side, BlockType::Sync]);
    }
}
